//! TypeScript bindings for the UI-facing snapshot types.

use crate::playback::PlaybackState;
use crate::poem::PoemKey;
use crate::query::{SearchCriteria, SortColumn, SortDirection};
use crate::session::{LibrarySnapshot, PlaybackView, PoemRow, ViewMode};
use crate::speech::Voice;
use std::fs;
use std::path::Path;
use ts_rs::TS;

const EXPORTED_TYPES: [&str; 10] = [
    "LibrarySnapshot",
    "PoemRow",
    "PlaybackView",
    "ViewMode",
    "PlaybackState",
    "PoemKey",
    "SearchCriteria",
    "SortColumn",
    "SortDirection",
    "Voice",
];

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Regenerate every `.ts` file in `out_dir` plus an `index.ts`.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<LibrarySnapshot>(out_dir)?;
    export_single_type::<PoemRow>(out_dir)?;
    export_single_type::<PlaybackView>(out_dir)?;
    export_single_type::<ViewMode>(out_dir)?;
    export_single_type::<PlaybackState>(out_dir)?;
    export_single_type::<PoemKey>(out_dir)?;
    export_single_type::<SearchCriteria>(out_dir)?;
    export_single_type::<SortColumn>(out_dir)?;
    export_single_type::<SortDirection>(out_dir)?;
    export_single_type::<Voice>(out_dir)?;

    let index_content: String = EXPORTED_TYPES
        .iter()
        .map(|name| format!("export type {{ {name} }} from \"./{name}\";\n"))
        .collect();
    let index_path = out_dir.join("index.ts");
    fs::write(&index_path, index_content)
        .map_err(|err| format!("Failed to write {}: {err}", index_path.display()))?;

    Ok(())
}
