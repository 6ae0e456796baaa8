use serde::{Deserialize, Serialize};
use strum::{FromRepr, IntoStaticStr};

/// Game mode.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    FromRepr,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Ruleset {
    #[default]
    #[strum(serialize = "osu")]
    Osu = 0,
    #[strum(serialize = "taiko")]
    Taiko = 1,
    #[strum(serialize = "fruits")]
    #[serde(rename = "fruits")]
    Catch = 2,
    #[strum(serialize = "mania")]
    Mania = 3,
}

impl Ruleset {
    /// Ruleset from its numeric id (stable mode / lazer online id).
    pub fn from_id(id: i32) -> Option<Self> {
        u8::try_from(id).ok().and_then(Self::from_repr)
    }

    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn short_name(&self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for Ruleset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_id() {
        assert_eq!(Ruleset::from_id(0), Some(Ruleset::Osu));
        assert_eq!(Ruleset::from_id(3), Some(Ruleset::Mania));
        assert_eq!(Ruleset::from_id(4), None);
        assert_eq!(Ruleset::from_id(-1), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(Ruleset::Catch.to_string(), "fruits");
        assert_eq!(
            serde_json::to_string(&Ruleset::Catch).unwrap(),
            "\"fruits\""
        );
        assert_eq!(serde_json::to_string(&Ruleset::Taiko).unwrap(), "\"taiko\"");
    }
}
