/// Release images stamp `VKPANEL_BUILD_VERSION`; local builds report the crate version.
pub const VERSION: &str = match option_env!("VKPANEL_BUILD_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

pub fn user_agent() -> String {
    format!("vkpanel-dashboard/{VERSION}")
}
