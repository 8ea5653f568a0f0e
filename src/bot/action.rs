//! Typed callback actions. Every inline button carries one of these, encoded
//! as a short `:`-separated tag that stays well under the 64-byte callback
//! data limit.

use thiserror::Error;

use crate::db::types::AttendanceStatus;
use crate::services::reports::PeriodPreset;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ActionError {
    #[error("unknown callback action `{0}`")]
    Unknown(String),
    #[error("invalid id `{value}` in callback action `{data}`")]
    InvalidId { data: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Workflow {
    Registration,
    Students,
    Groups,
    Subjects,
    Attendance,
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Nav(Nav),
    Register(RegisterAction),
    Students(StudentAction),
    Groups(GroupAction),
    Subjects(SubjectAction),
    Attendance(AttendanceAction),
    Report(ReportAction),
}

/// Buttons that work outside any workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Nav {
    MainMenu,
    Help,
    MyAttendance,
    QuickSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegisterAction {
    Start,
    Group(i64),
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StudentAction {
    Open,
    List,
    Add,
    AddToGroup(i64),
    Edit,
    EditSelect(i64),
    Delete,
    DeleteSelect(i64),
    ConfirmDelete(i64),
    CancelDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupAction {
    Open,
    List,
    Add,
    Edit,
    EditSelect(i64),
    Delete,
    DeleteSelect(i64),
    ConfirmDelete(i64),
    ConfirmDeleteWithStudents(i64),
    MoveStudents(i64),
    CancelDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubjectAction {
    Open,
    List,
    ListGroup(i64),
    Add,
    AddToGroup(i64),
    Delete,
    DeleteFromGroup(i64),
    /// Carries a `group_subjects` id.
    DeleteSelect(i64),
    ConfirmDelete(i64),
    CancelDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttendanceAction {
    Start,
    Group(i64),
    /// Carries a `group_subjects` id.
    Subject(i64),
    Today,
    ManualDate,
    Mark { student_id: i64, status: AttendanceStatus },
    Refresh,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReportAction {
    Start,
    Group(i64),
    Preset(PeriodPreset),
    Custom,
}

impl Action {
    pub(crate) fn workflow(&self) -> Option<Workflow> {
        match self {
            Self::Nav(_) => None,
            Self::Register(_) => Some(Workflow::Registration),
            Self::Students(_) => Some(Workflow::Students),
            Self::Groups(_) => Some(Workflow::Groups),
            Self::Subjects(_) => Some(Workflow::Subjects),
            Self::Attendance(_) => Some(Workflow::Attendance),
            Self::Report(_) => Some(Workflow::Report),
        }
    }

    /// Buttons that (re)start a workflow from its first screen.
    pub(crate) fn is_entry(&self) -> bool {
        matches!(
            self,
            Self::Register(RegisterAction::Start)
                | Self::Students(StudentAction::Open)
                | Self::Groups(GroupAction::Open)
                | Self::Subjects(SubjectAction::Open)
                | Self::Attendance(AttendanceAction::Start)
                | Self::Report(ReportAction::Start)
        )
    }

    pub(crate) fn encode(&self) -> String {
        match *self {
            Self::Nav(nav) => match nav {
                Nav::MainMenu => "nav:main".to_string(),
                Nav::Help => "nav:help".to_string(),
                Nav::MyAttendance => "nav:me".to_string(),
                Nav::QuickSummary => "nav:quick".to_string(),
            },
            Self::Register(action) => match action {
                RegisterAction::Start => "rg:start".to_string(),
                RegisterAction::Group(id) => format!("rg:grp:{id}"),
                RegisterAction::Cancel => "rg:cancel".to_string(),
            },
            Self::Students(action) => match action {
                StudentAction::Open => "st:open".to_string(),
                StudentAction::List => "st:list".to_string(),
                StudentAction::Add => "st:add".to_string(),
                StudentAction::AddToGroup(id) => format!("st:grp:{id}"),
                StudentAction::Edit => "st:edit".to_string(),
                StudentAction::EditSelect(id) => format!("st:edsel:{id}"),
                StudentAction::Delete => "st:del".to_string(),
                StudentAction::DeleteSelect(id) => format!("st:delsel:{id}"),
                StudentAction::ConfirmDelete(id) => format!("st:delok:{id}"),
                StudentAction::CancelDelete => "st:delno".to_string(),
            },
            Self::Groups(action) => match action {
                GroupAction::Open => "gr:open".to_string(),
                GroupAction::List => "gr:list".to_string(),
                GroupAction::Add => "gr:add".to_string(),
                GroupAction::Edit => "gr:edit".to_string(),
                GroupAction::EditSelect(id) => format!("gr:edsel:{id}"),
                GroupAction::Delete => "gr:del".to_string(),
                GroupAction::DeleteSelect(id) => format!("gr:delsel:{id}"),
                GroupAction::ConfirmDelete(id) => format!("gr:delok:{id}"),
                GroupAction::ConfirmDeleteWithStudents(id) => format!("gr:delall:{id}"),
                GroupAction::MoveStudents(id) => format!("gr:move:{id}"),
                GroupAction::CancelDelete => "gr:delno".to_string(),
            },
            Self::Subjects(action) => match action {
                SubjectAction::Open => "sb:open".to_string(),
                SubjectAction::List => "sb:list".to_string(),
                SubjectAction::ListGroup(id) => format!("sb:lgrp:{id}"),
                SubjectAction::Add => "sb:add".to_string(),
                SubjectAction::AddToGroup(id) => format!("sb:agrp:{id}"),
                SubjectAction::Delete => "sb:del".to_string(),
                SubjectAction::DeleteFromGroup(id) => format!("sb:dgrp:{id}"),
                SubjectAction::DeleteSelect(id) => format!("sb:delsel:{id}"),
                SubjectAction::ConfirmDelete(id) => format!("sb:delok:{id}"),
                SubjectAction::CancelDelete => "sb:delno".to_string(),
            },
            Self::Attendance(action) => match action {
                AttendanceAction::Start => "at:start".to_string(),
                AttendanceAction::Group(id) => format!("at:grp:{id}"),
                AttendanceAction::Subject(id) => format!("at:sub:{id}"),
                AttendanceAction::Today => "at:today".to_string(),
                AttendanceAction::ManualDate => "at:manual".to_string(),
                AttendanceAction::Mark { student_id, status } => {
                    format!("at:mk:{student_id}:{}", status_code(status))
                }
                AttendanceAction::Refresh => "at:ref".to_string(),
                AttendanceAction::Save => "at:save".to_string(),
            },
            Self::Report(action) => match action {
                ReportAction::Start => "rp:start".to_string(),
                ReportAction::Group(id) => format!("rp:grp:{id}"),
                ReportAction::Preset(PeriodPreset::Week) => "rp:week".to_string(),
                ReportAction::Preset(PeriodPreset::Month) => "rp:month".to_string(),
                ReportAction::Preset(PeriodPreset::AllTime) => "rp:all".to_string(),
                ReportAction::Custom => "rp:custom".to_string(),
            },
        }
    }

    pub(crate) fn decode(data: &str) -> Result<Self, ActionError> {
        let parts: Vec<&str> = data.split(':').collect();

        let action: Action = match parts.as_slice() {
            ["nav", "main"] => Nav::MainMenu.into(),
            ["nav", "help"] => Nav::Help.into(),
            ["nav", "me"] => Nav::MyAttendance.into(),
            ["nav", "quick"] => Nav::QuickSummary.into(),

            ["rg", "start"] => RegisterAction::Start.into(),
            ["rg", "grp", value] => RegisterAction::Group(parse_id(data, value)?).into(),
            ["rg", "cancel"] => RegisterAction::Cancel.into(),

            ["st", "open"] => StudentAction::Open.into(),
            ["st", "list"] => StudentAction::List.into(),
            ["st", "add"] => StudentAction::Add.into(),
            ["st", "grp", value] => StudentAction::AddToGroup(parse_id(data, value)?).into(),
            ["st", "edit"] => StudentAction::Edit.into(),
            ["st", "edsel", value] => StudentAction::EditSelect(parse_id(data, value)?).into(),
            ["st", "del"] => StudentAction::Delete.into(),
            ["st", "delsel", value] => StudentAction::DeleteSelect(parse_id(data, value)?).into(),
            ["st", "delok", value] => StudentAction::ConfirmDelete(parse_id(data, value)?).into(),
            ["st", "delno"] => StudentAction::CancelDelete.into(),

            ["gr", "open"] => GroupAction::Open.into(),
            ["gr", "list"] => GroupAction::List.into(),
            ["gr", "add"] => GroupAction::Add.into(),
            ["gr", "edit"] => GroupAction::Edit.into(),
            ["gr", "edsel", value] => GroupAction::EditSelect(parse_id(data, value)?).into(),
            ["gr", "del"] => GroupAction::Delete.into(),
            ["gr", "delsel", value] => GroupAction::DeleteSelect(parse_id(data, value)?).into(),
            ["gr", "delok", value] => GroupAction::ConfirmDelete(parse_id(data, value)?).into(),
            ["gr", "delall", value] => {
                GroupAction::ConfirmDeleteWithStudents(parse_id(data, value)?).into()
            }
            ["gr", "move", value] => GroupAction::MoveStudents(parse_id(data, value)?).into(),
            ["gr", "delno"] => GroupAction::CancelDelete.into(),

            ["sb", "open"] => SubjectAction::Open.into(),
            ["sb", "list"] => SubjectAction::List.into(),
            ["sb", "lgrp", value] => SubjectAction::ListGroup(parse_id(data, value)?).into(),
            ["sb", "add"] => SubjectAction::Add.into(),
            ["sb", "agrp", value] => SubjectAction::AddToGroup(parse_id(data, value)?).into(),
            ["sb", "del"] => SubjectAction::Delete.into(),
            ["sb", "dgrp", value] => SubjectAction::DeleteFromGroup(parse_id(data, value)?).into(),
            ["sb", "delsel", value] => SubjectAction::DeleteSelect(parse_id(data, value)?).into(),
            ["sb", "delok", value] => SubjectAction::ConfirmDelete(parse_id(data, value)?).into(),
            ["sb", "delno"] => SubjectAction::CancelDelete.into(),

            ["at", "start"] => AttendanceAction::Start.into(),
            ["at", "grp", value] => AttendanceAction::Group(parse_id(data, value)?).into(),
            ["at", "sub", value] => AttendanceAction::Subject(parse_id(data, value)?).into(),
            ["at", "today"] => AttendanceAction::Today.into(),
            ["at", "manual"] => AttendanceAction::ManualDate.into(),
            ["at", "mk", value, code] => {
                let status =
                    status_from_code(code).ok_or_else(|| ActionError::Unknown(data.to_string()))?;
                AttendanceAction::Mark { student_id: parse_id(data, value)?, status }.into()
            }
            ["at", "ref"] => AttendanceAction::Refresh.into(),
            ["at", "save"] => AttendanceAction::Save.into(),

            ["rp", "start"] => ReportAction::Start.into(),
            ["rp", "grp", value] => ReportAction::Group(parse_id(data, value)?).into(),
            ["rp", "week"] => ReportAction::Preset(PeriodPreset::Week).into(),
            ["rp", "month"] => ReportAction::Preset(PeriodPreset::Month).into(),
            ["rp", "all"] => ReportAction::Preset(PeriodPreset::AllTime).into(),
            ["rp", "custom"] => ReportAction::Custom.into(),

            _ => return Err(ActionError::Unknown(data.to_string())),
        };

        Ok(action)
    }
}

fn parse_id(data: &str, value: &str) -> Result<i64, ActionError> {
    value.parse::<i64>().map_err(|_| ActionError::InvalidId {
        data: data.to_string(),
        value: value.to_string(),
    })
}

fn status_code(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Present => "p",
        AttendanceStatus::Absent => "a",
        AttendanceStatus::Late => "l",
    }
}

fn status_from_code(code: &str) -> Option<AttendanceStatus> {
    match code {
        "p" => Some(AttendanceStatus::Present),
        "a" => Some(AttendanceStatus::Absent),
        "l" => Some(AttendanceStatus::Late),
        _ => None,
    }
}

macro_rules! into_action {
    ($($source:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Action {
                fn from(action: $source) -> Self {
                    Self::$variant(action)
                }
            }
        )*
    };
}

into_action!(
    Nav => Nav,
    RegisterAction => Register,
    StudentAction => Students,
    GroupAction => Groups,
    SubjectAction => Subjects,
    AttendanceAction => Attendance,
    ReportAction => Report,
);
