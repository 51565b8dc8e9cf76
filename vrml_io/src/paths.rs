use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::{fs, io};

/// Environment variable holding extra script engine directories, in the
/// platform's `PATH` syntax. Searched before the defaults.
pub const SCRIPT_PATH_ENV: &str = "VRML_SCRIPT_PATH";

/// Per-user directory for script engine modules:
/// - Windows: `{FOLDERID_RoamingAppData}\vrml\script`
/// - macOS: `$HOME/Library/Application Support/vrml/script`
/// - Linux: `$XDG_DATA_HOME/vrml/script` or `$HOME/.local/share/vrml/script`
pub fn user_script_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("vrml").join("script"))
}

/// Directories searched for script engine modules, in search order.
pub fn script_search_path() -> Vec<PathBuf> {
    let mut path: Vec<PathBuf> = std::env::var_os(SCRIPT_PATH_ENV)
        .map(|value| std::env::split_paths(&value).collect())
        .unwrap_or_default();
    if let Some(dir) = user_script_dir() {
        path.push(dir);
    }
    path
}

/// File extension of loadable modules on this platform (`so`, `dylib`, `dll`).
pub fn module_extension() -> &'static str {
    std::env::consts::DLL_EXTENSION
}

/// Loadable modules directly inside `dir`, sorted by file name.
/// A missing directory yields no modules.
pub fn module_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut modules = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension() == Some(OsStr::new(module_extension())) {
            modules.push(path);
        }
    }
    modules.sort();
    Ok(modules)
}
