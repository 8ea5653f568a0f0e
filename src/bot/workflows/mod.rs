//! One module per workflow. Each exposes its `Step` enum plus `enter`,
//! `on_action` and `on_text` transitions driven by the engine.

pub(crate) mod attendance;
pub(crate) mod groups;
pub(crate) mod registration;
pub(crate) mod reports;
pub(crate) mod students;
pub(crate) mod subjects;

use super::action::Action;
use super::screen::{Button, Screen};
use crate::db::models::Group;

/// One button per group, in the order given.
pub(super) fn group_buttons<A: Into<Action>>(
    screen: Screen,
    groups: &[Group],
    action: impl Fn(i64) -> A,
) -> Screen {
    groups.iter().fold(screen, |screen, group| {
        screen.row(vec![Button::new(group.name.clone(), action(group.id).into())])
    })
}
