use crate::domain::level::Level;

/// Per-user preferences used by the ad-hoc search and the tips commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettings {
    pub user_id: i64,
    pub city_id: Option<String>,
    pub level: Option<Level>,
}

impl UserSettings {
    pub fn defaults(user_id: i64) -> UserSettings {
        UserSettings {
            user_id,
            city_id: None,
            level: None,
        }
    }
}
