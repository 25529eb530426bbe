/// Minimum rightward travel, in CSS pixels, for a swipe to arm a reply.
pub const SWIPE_THRESHOLD_PX: f64 = 80.0;

const TOUCH_AGENTS: [&str; 8] = [
    "android", "webos", "iphone", "ipad", "ipod", "blackberry", "iemobile", "opera mini",
];

/// How the connected browser arms a reply. Picked once when the socket opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// Reply button on every message.
    Pointer,
    /// Swipe right on a message.
    Touch,
}

impl Device {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if TOUCH_AGENTS.iter().any(|agent| ua.contains(agent)) {
            Device::Touch
        } else {
            Device::Pointer
        }
    }

    pub fn arms_on_click(self) -> bool {
        matches!(self, Device::Pointer)
    }

    pub fn arms_on_swipe(self, start_x: f64, end_x: f64) -> bool {
        matches!(self, Device::Touch) && end_x - start_x > SWIPE_THRESHOLD_PX
    }
}
