pub(crate) mod admins;
pub(crate) mod attendance;
pub(crate) mod bot_offsets;
pub(crate) mod groups;
pub(crate) mod lessons;
pub(crate) mod students;
pub(crate) mod subjects;
