//! Engine endpoints, defaults and user-facing messages

/// Default configuration values
pub mod defaults {
    /// Engine address when `COMFYUI_API_URL` is unset
    pub const API_URL: &str = "127.0.0.1:8188";

    /// Interval between history polls while a prompt runs
    pub const POLL_INTERVAL_MS: u64 = 500;
}

/// Environment variables read by `EngineConfig::from_env`
pub mod env {
    pub const API_URL: &str = "COMFYUI_API_URL";
    pub const SECURE: &str = "COMFYUI_SECURE";
    pub const OUTPUT_DIR: &str = "COMFY_OUTPUT_DIR";
    pub const POLL_INTERVAL_MS: &str = "COMFYUI_POLL_INTERVAL_MS";
}

/// HTTP endpoints of the engine
pub mod endpoints {
    pub const PROMPT: &str = "/prompt";
    pub const HISTORY: &str = "/history";
    pub const QUEUE: &str = "/queue";
    pub const UPLOAD_IMAGE: &str = "/upload/image";
    pub const UPLOAD_MASK: &str = "/upload/mask";
    pub const VIEW: &str = "/view";
}

/// Messages surfaced to callers
pub mod messages {
    pub const RUN_FAILED: &str = "Error running workflow";
    pub const RUN_FAILED_HINT: &str = "Something went wrong running the workflow, the most common cases are missing nodes and running out of Vram. Make sure that you can run this workflow in your local comfy";
    pub const NO_OUTPUTS: &str = "No output files found";
    pub const NO_OUTPUTS_HINT: &str = "Make sure your workflow contains at least one node that saves an output to the ComfyUI output folder. eg. \"Save Image\" or \"Video Combine\" from comfyui-videohelpersuite";
    pub const INTERRUPTED: &str = "Workflow execution was interrupted";
}
