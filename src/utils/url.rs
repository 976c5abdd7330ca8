use url::Url;

/// Rewrite share links into direct content links. Dropbox share pages
/// (`www.dropbox.com/...?dl=0`) are served from `dl.dropboxusercontent.com`
/// without the `dl` flag. Anything else, including unparsable input, is
/// returned unchanged.
pub fn direct_media_url(url: &str) -> String {
    if !url.contains("dropbox.com") {
        return url.to_string();
    }

    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if parsed.host_str() != Some("www.dropbox.com") {
        return url.to_string();
    }
    if parsed.set_host(Some("dl.dropboxusercontent.com")).is_err() {
        return url.to_string();
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != "dl")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_dropbox_share_link() {
        assert_eq!(
            direct_media_url("https://www.dropbox.com/s/abc/file.mp4?dl=0"),
            "https://dl.dropboxusercontent.com/s/abc/file.mp4"
        );
    }

    #[test]
    fn test_keeps_other_query_parameters() {
        assert_eq!(
            direct_media_url("https://www.dropbox.com/s/abc/file.mp4?rlkey=xyz&dl=1"),
            "https://dl.dropboxusercontent.com/s/abc/file.mp4?rlkey=xyz"
        );
    }

    #[test]
    fn test_leaves_other_urls_alone() {
        let plain = "https://cdn.example.com/movie.mp4?dl=0";
        assert_eq!(direct_media_url(plain), plain);

        let direct = "https://dl.dropboxusercontent.com/s/abc/file.mp4";
        assert_eq!(direct_media_url(direct), direct);

        assert_eq!(direct_media_url("not a url dropbox.com"), "not a url dropbox.com");
    }
}
