//! ffmpeg argument lists for each pipeline step.

use std::path::Path;

use url::Url;

use crate::http::USER_AGENT;

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Copy every stream of a remote playlist into `output` without re-encoding.
pub fn remux_args(manifest: &Url, output: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        manifest.to_string(),
        "-user_agent".into(),
        USER_AGENT.into(),
        "-map".into(),
        "0".into(),
        "-c".into(),
        "copy".into(),
        path_arg(output),
    ]
}

/// Re-encode a downloaded image into the format implied by `output`.
pub fn cover_args(downloaded: &Path, output: &Path) -> Vec<String> {
    vec!["-i".into(), path_arg(downloaded), path_arg(output)]
}

/// Combine media, sidecar metadata and cover art into the final file.
pub fn mux_args(media: &Path, metadata: &Path, cover: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        path_arg(media),
        "-i".into(),
        path_arg(metadata),
        "-i".into(),
        path_arg(cover),
        "-map".into(),
        "0".into(),
        "-map_metadata".into(),
        "1".into(),
        "-map".into(),
        "2:v".into(),
        "-disposition:v:0".into(),
        "attached_pic".into(),
        "-c".into(),
        "copy".into(),
        "-movflags".into(),
        "+faststart".into(),
        path_arg(output),
    ]
}
