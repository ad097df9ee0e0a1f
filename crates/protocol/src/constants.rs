/// File extension of the only container format the materializer unpacks.
pub const CONTAINER_EXTENSION: &str = "zip";

/// Suffix appended to a download target while bytes are still arriving.
pub const PARTIAL_SUFFIX: &str = "part";

/// Default cache root, relative to the process working directory.
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Subdirectory of the cache root holding cover thumbnails.
pub const COVER_IMAGES_DIR: &str = "cover_images";

/// File under the cache root holding the last fetched catalog list.
pub const CATALOG_LIST_FILE: &str = "roms_list.json";

/// Platform folder override file.
pub const PLATFORM_FOLDERS_FILE: &str = "platform_folders.json";

/// Template copied into place when no override file exists yet.
pub const PLATFORM_FOLDERS_TEMPLATE: &str = "platform_folders.template.json";

/// Catalog login endpoint.
pub const LOGIN_ENDPOINT: &str = "/api/login";

/// Catalog item list endpoint.
pub const ROMS_ENDPOINT: &str = "/api/roms";
