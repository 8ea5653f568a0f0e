use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Role stored in `admins.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub(crate) enum StaffRole {
    Admin,
    Headman,
}

impl StaffRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Headman => "headman",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub(crate) enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub(crate) const ALL: [AttendanceStatus; 3] = [Self::Present, Self::Absent, Self::Late];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
        }
    }

    pub(crate) fn icon(self) -> &'static str {
        match self {
            Self::Present => "✅",
            Self::Absent => "❌",
            Self::Late => "⏰",
        }
    }

    /// Human label used on buttons and in report sheets.
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Present => "Присутствовал",
            Self::Absent => "Отсутствовал",
            Self::Late => "Опоздал",
        }
    }

    /// Credit towards attendance; late counts as half.
    pub(crate) fn score(self) -> f64 {
        match self {
            Self::Present => 1.0,
            Self::Absent => 0.0,
            Self::Late => 0.5,
        }
    }
}

pub(crate) const UNMARKED_ICON: &str = "⚪";
pub(crate) const UNMARKED_LABEL: &str = "Не отмечен";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_is_half_credit() {
        assert_eq!(AttendanceStatus::Late.score(), 0.5);
        assert_eq!(AttendanceStatus::Present.score(), 1.0);
        assert_eq!(AttendanceStatus::Absent.score(), 0.0);
    }
}
