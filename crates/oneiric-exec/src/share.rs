/// What the user is sharing. `media` is a reference only; terminals cannot attach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRequest {
    pub title: String,
    pub text: String,
    pub media: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareStatus {
    Shared,
    Copied,
    Failed(String),
}

/// Destination for shared content. Best effort; failures are reported, never raised.
pub trait ShareTarget: Send {
    fn share(&mut self, request: &ShareRequest) -> ShareStatus;
}

/// Copies the share text to the system clipboard.
#[derive(Debug, Default)]
pub struct ClipboardShare;

impl ShareTarget for ClipboardShare {
    fn share(&mut self, request: &ShareRequest) -> ShareStatus {
        let mut clipboard = match arboard::Clipboard::new() {
            Ok(clipboard) => clipboard,
            Err(err) => return ShareStatus::Failed(err.to_string()),
        };
        match clipboard.set_text(share_text(request)) {
            Ok(()) => ShareStatus::Copied,
            Err(err) => ShareStatus::Failed(err.to_string()),
        }
    }
}

/// Clipboard text: the share text followed by the media reference when there is one.
pub fn share_text(request: &ShareRequest) -> String {
    match request.media.as_deref() {
        Some(media) if !media.is_empty() => format!("{}\n{media}", request.text),
        _ => request.text.clone(),
    }
}

/// Keeps shared requests in memory.
#[derive(Debug, Default)]
pub struct RecordingShare {
    pub shared: Vec<ShareRequest>,
}

impl ShareTarget for RecordingShare {
    fn share(&mut self, request: &ShareRequest) -> ShareStatus {
        self.shared.push(request.clone());
        ShareStatus::Shared
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn clipboard_text_appends_media_reference() {
        let request = ShareRequest {
            title: "云端漫步".to_string(),
            text: "【云端漫步】\n\n自由\n\n#Oneiric梦境日志".to_string(),
            media: Some("https://img".to_string()),
        };
        assert_eq!(
            share_text(&request),
            "【云端漫步】\n\n自由\n\n#Oneiric梦境日志\nhttps://img"
        );

        let bare = ShareRequest {
            media: None,
            ..request
        };
        assert_eq!(share_text(&bare), bare.text);
    }

    #[test]
    fn recording_target_keeps_requests() {
        let mut target = RecordingShare::default();
        let request = ShareRequest {
            title: "t".to_string(),
            text: "x".to_string(),
            media: None,
        };
        assert_eq!(target.share(&request), ShareStatus::Shared);
        assert_eq!(target.shared, vec![request]);
    }
}
