use rand::seq::IndexedRandom;

/// Characters used for generated room codes. Look-alikes (I, L, O, 0, 1) are left out.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LEN: usize = 6;

pub fn generate_room_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .filter_map(|_| ROOM_CODE_ALPHABET.choose(&mut rng))
        .map(|&b| b as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..200 {
            let code = generate_room_code(ROOM_CODE_LEN);
            assert_eq!(code.len(), ROOM_CODE_LEN);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)), "{code}");
        }
    }

    #[test]
    fn test_zero_length() {
        assert_eq!(generate_room_code(0), "");
    }
}
