//! Names used by the upload and mask protocols

/// Engine-side folder and file names for masked inputs
pub mod clipspace {
    /// Subfolder of the engine input directory holding mask uploads
    pub const SUBFOLDER: &str = "clipspace";

    /// Mask bytes layered over the base image
    pub const MASK_STAGE: &str = "mask";

    /// Copy of the base image the final mask is layered over
    pub const PAINTED_STAGE: &str = "painted";

    /// Final masked image the node reads
    pub const PAINTED_MASKED_STAGE: &str = "painted-masked";

    /// Engine file annotation appended to bound clipspace references
    pub const INPUT_ANNOTATION: &str = "[input]";
}

/// Plain upload naming
pub mod uploads {
    /// Hex characters of the per-upload suffix
    pub const UNIQUE_SUFFIX_LEN: usize = 8;
}
