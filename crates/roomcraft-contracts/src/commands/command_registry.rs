#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Slash commands whose argument is a settings value, keyed by field name.
pub(crate) const SETTING_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "prompt",
        action: "prompt",
    },
    CommandSpec {
        command: "style",
        action: "style",
    },
    CommandSpec {
        command: "room",
        action: "roomType",
    },
    CommandSpec {
        command: "weight",
        action: "inspirationWeight",
    },
    CommandSpec {
        command: "design",
        action: "design",
    },
    CommandSpec {
        command: "budget",
        action: "budget",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "image",
        action: "set_primary_image",
    },
    CommandSpec {
        command: "download",
        action: "download",
    },
];

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "add",
    action: "add_auxiliary_images",
}];

pub(crate) const INDEX_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "remove",
    action: "remove_auxiliary_image",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "next",
        action: "next",
    },
    CommandSpec {
        command: "back",
        action: "back",
    },
    CommandSpec {
        command: "generate",
        action: "finish",
    },
    CommandSpec {
        command: "finish",
        action: "finish",
    },
    CommandSpec {
        command: "open",
        action: "open",
    },
    CommandSpec {
        command: "reset",
        action: "reset_result",
    },
    CommandSpec {
        command: "restart",
        action: "reset_workflow",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const WIZARD_HELP_COMMANDS: &[&str] = &[
    "/image PATH",
    "/add PATH...",
    "/remove N",
    "/next",
    "/back",
    "/prompt TEXT",
    "/style TAG",
    "/room TAG",
    "/weight TAG",
    "/design TAG",
    "/budget N",
    "/generate",
    "/open",
    "/download [DIR]",
    "/reset",
    "/restart",
    "/status",
    "/history",
    "/help",
    "/quit",
];
