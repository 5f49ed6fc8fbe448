use super::model::{AdaptationSet, Representation};

/// Index of the Representation with the strictly largest bandwidth.
///
/// The first Representation wins ties, and a missing or malformed bandwidth never replaces the
/// current choice.
pub fn best_representation(representations: &[Representation]) -> Option<usize> {
    let (first, rest) = representations.split_first()?;

    let mut best_index = 0;
    let mut best_bandwidth = first.bandwidth();
    for (i, representation) in rest.iter().enumerate() {
        let bandwidth = representation.bandwidth();
        // `None` orders below every `Some`
        if bandwidth > best_bandwidth {
            best_bandwidth = bandwidth;
            best_index = i + 1;
        }
    }

    Some(best_index)
}

/// Content type of an adaptation set: `contentType` if present, otherwise guessed from the
/// chosen Representation's MIME type, falling back to `audio`.
pub fn content_type(adaptation: &AdaptationSet, representation: &Representation) -> String {
    let content_type = adaptation.content_type.as_deref().unwrap_or_default().trim();
    if !content_type.is_empty() {
        return content_type.to_string();
    }

    let mime_type = representation
        .mime_type
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if mime_type.contains("audio/") {
        "audio".to_string()
    } else if mime_type.contains("video/") {
        "video".to_string()
    } else {
        "audio".to_string()
    }
}
