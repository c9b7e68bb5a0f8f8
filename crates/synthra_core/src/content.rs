use url::Url;

const WATCH_HOSTS: [&str; 4] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];
const SHORT_HOST: &str = "youtu.be";

/// Extracts the video id from a supported watch-page URL.
///
/// Accepts `https://(www.|m.)youtube.com/watch?v=<id>` and
/// `https://youtu.be/<id>`; anything else yields `None`.
pub fn content_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();

    let id = if WATCH_HOSTS.contains(&host.as_str()) {
        if url.path() != "/watch" {
            return None;
        }
        url.query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())?
    } else if host == SHORT_HOST {
        url.path_segments()?.next()?.to_string()
    } else {
        return None;
    };

    is_valid_id(&id).then_some(id)
}

pub fn is_supported_content_url(raw: &str) -> bool {
    content_id_from_url(raw).is_some()
}

pub fn thumbnail_ref(content_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{content_id}/hqdefault.jpg")
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
