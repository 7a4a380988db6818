/// Suffix appended to a build's base path to form its workspace root.
pub const WORKSPACE_SUFFIX: &str = ".d";

/// Subdirectory of the workspace root holding request-supplied headers.
pub const HEADER_DIR_NAME: &str = "headers";

/// Subdirectory of the workspace root holding stage logs and intermediates.
/// Has no extension, so no accepted source name can collide with it.
pub const SCRATCH_DIR_NAME: &str = "stage";

/// Name the optimizer input is moved to before each optimization pass.
pub const UNOPTIMIZED_NAME: &str = "unopt.wasm";

/// Prefix of every per-build base name handed out by the service.
pub const BUILD_PREFIX: &str = "build_";
