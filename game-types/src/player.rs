use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// The fixed set of rider icons a player can race as. The names double as
/// the image asset ids the front end loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Icon {
    Horse1,
    Horse2,
    Horse3,
    Horse4,
    Horse5,
    Horse6,
    Horse7,
    Horse8,
}

impl Icon {
    pub const ALL: [Icon; 8] = [
        Icon::Horse1,
        Icon::Horse2,
        Icon::Horse3,
        Icon::Horse4,
        Icon::Horse5,
        Icon::Horse6,
        Icon::Horse7,
        Icon::Horse8,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Icon::Horse1 => "Horse1",
            Icon::Horse2 => "Horse2",
            Icon::Horse3 => "Horse3",
            Icon::Horse4 => "Horse4",
            Icon::Horse5 => "Horse5",
            Icon::Horse6 => "Horse6",
            Icon::Horse7 => "Horse7",
            Icon::Horse8 => "Horse8",
        }
    }
}

impl FromStr for Icon {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Icon::ALL
            .iter()
            .copied()
            .find(|icon| icon.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `RoundSummary.PlayerStates`. The array position is the
/// player's registration index, which is stable for the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerState {
    pub name: String,
    pub icon: Icon,
    pub score: u32,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_round_trips_through_its_wire_name() {
        for icon in Icon::ALL {
            assert_eq!(icon.as_str().parse::<Icon>(), Ok(icon));
        }
        assert!("Horse9".parse::<Icon>().is_err());
        assert!("horse1".parse::<Icon>().is_err());
    }

    #[test]
    fn player_state_uses_pascal_case_fields() {
        let state = PlayerState {
            name: "Alice".to_string(),
            icon: Icon::Horse3,
            score: 200,
            active: true,
        };

        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(
            json,
            r#"{"Name":"Alice","Icon":"Horse3","Score":200,"Active":true}"#
        );
    }
}
