//! Conventions shared between the binder, the gateway and workflow templates

use serde_json::Value;

/// Key path conventions
pub mod key_paths {
    /// Delimiter between key path segments
    pub const SEPARATOR: char = '-';

    /// Final segment marking a mask paired with the field before it
    pub const MASK_SUFFIX: &str = "viewcomfymask";
}

/// Node conventions applied during the finishing pass
pub mod nodes {
    /// Class types that write artifacts to the engine's output folder
    pub const SINK_CLASS_TYPES: &[&str] = &["SaveImage", "VHS_VideoCombine"];

    /// Input on sink nodes that controls output file names
    pub const FILENAME_PREFIX_INPUT: &str = "filename_prefix";

    /// Input name fragments that mark a field as a seed
    pub const SEED_LIKE_INPUTS: &[&str] = &["seed", "noise_seed", "rand_seed"];

    /// Value a template stores in a seed field to ask for a random seed.
    ///
    /// This is the smallest positive double (`Number.MIN_VALUE` in the
    /// template editors that produce these files).
    pub const SEED_SENTINEL: f64 = 5e-324;

    /// Exclusive upper bound for generated seeds
    pub const SEED_UPPER_BOUND: u64 = 1 << 32;
}

/// Template file conventions
pub mod templates {
    /// Default template document name
    pub const VIEW_COMFY_FILE_NAME: &str = "view_comfy.json";

    /// Key holding the API-format graph inside a `workflows[]` entry
    pub const WORKFLOW_API_KEY: &str = "workflowApiJSON";
}

/// Whether `class_type` names an artifact-sink node
pub fn is_sink_class(class_type: &str) -> bool {
    nodes::SINK_CLASS_TYPES.contains(&class_type)
}

/// Whether an input name looks like a seed field
pub fn is_seed_like(input_name: &str) -> bool {
    nodes::SEED_LIKE_INPUTS
        .iter()
        .any(|marker| input_name.contains(marker))
}

/// Whether a value is the "randomize me" seed sentinel
pub fn is_seed_sentinel(value: &Value) -> bool {
    value
        .as_f64()
        .map_or(false, |v| v.to_bits() == nodes::SEED_SENTINEL.to_bits())
}
