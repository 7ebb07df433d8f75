//! Raw asset fetching, native and WASM.
//!
//! Relative asset references (glTF buffers, images) resolve against the base
//! path the loader was configured with. On native targets this is a
//! filesystem directory; on WASM it is joined onto the page origin and
//! fetched.

use crate::loader::LoadError;

#[cfg(target_arch = "wasm32")]
fn format_url(base: &str, file_name: &str) -> Result<reqwest::Url, LoadError> {
    let window = web_sys::window().ok_or_else(|| LoadError::Fetch {
        path: file_name.to_string(),
        message: "no window object".to_string(),
    })?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| LoadError::Fetch {
            path: file_name.to_string(),
            message: "origin unavailable".to_string(),
        })?;
    let base_url = reqwest::Url::parse(&format!("{}/{}/", origin, base.trim_matches('/')))
        .map_err(|e| LoadError::Fetch {
            path: file_name.to_string(),
            message: e.to_string(),
        })?;
    base_url.join(file_name).map_err(|e| LoadError::Fetch {
        path: file_name.to_string(),
        message: e.to_string(),
    })
}

/// Read a file below the base path into memory.
pub async fn load_binary(base: &str, file_name: &str) -> Result<Vec<u8>, LoadError> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(base, file_name)?;
        let response = reqwest::get(url).await.map_err(|e| LoadError::Fetch {
            path: file_name.to_string(),
            message: e.to_string(),
        })?;
        response
            .bytes()
            .await
            .map_err(|e| LoadError::Fetch {
                path: file_name.to_string(),
                message: e.to_string(),
            })?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new(base).join(file_name);
        tokio::fs::read(&path).await.map_err(|e| LoadError::Io {
            path: path.display().to_string(),
            source: e,
        })?
    };

    Ok(data)
}
