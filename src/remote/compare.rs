use crate::types::ResourceMetadata;

/// Whether `remote` proves that the resource behind `cached` has not changed.
///
/// When both sides carry a strong ETag, the ETags decide, unless both sides
/// also report positive content lengths that differ. Weak ETags (`W/"…"`)
/// only claim semantic equivalence and are ignored. Otherwise the evidence
/// must be a matching last-modified time *and* a matching positive content
/// length. Anything less (missing attributes, zero lengths, no cached
/// metadata at all) is reported as "changed", which routes the caller to a
/// re-fetch.
pub fn is_definitely_unchanged(cached: Option<&ResourceMetadata>, remote: &ResourceMetadata) -> bool {
    let Some(cached) = cached else {
        return false;
    };

    if let (Some(local_etag), Some(remote_etag)) = (strong(&cached.etag), strong(&remote.etag)) {
        let lengths_agree = match (positive(cached.content_length), positive(remote.content_length)) {
            (Some(local_len), Some(remote_len)) => local_len == remote_len,
            _ => true,
        };
        return local_etag == remote_etag && lengths_agree;
    }

    match (
        cached.last_modified,
        remote.last_modified,
        positive(cached.content_length),
        positive(remote.content_length),
    ) {
        (Some(local_modified), Some(remote_modified), Some(local_len), Some(remote_len)) => {
            local_modified == remote_modified && local_len == remote_len
        }
        _ => false,
    }
}

fn strong(etag: &Option<String>) -> Option<&str> {
    etag.as_deref().filter(|tag| !tag.is_empty() && !tag.starts_with("W/"))
}

fn positive(length: Option<u64>) -> Option<u64> {
    length.filter(|&len| len > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};

    fn modified() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(19_000)
    }

    fn dated(len: u64) -> ResourceMetadata {
        ResourceMetadata::new()
            .with_last_modified(modified())
            .with_content_length(len)
    }

    #[test]
    fn no_cached_metadata_is_changed() {
        assert!(!is_definitely_unchanged(None, &dated(10)));
    }

    #[test]
    fn matching_date_and_length_is_unchanged() {
        assert!(is_definitely_unchanged(Some(&dated(10)), &dated(10)));
    }

    #[test]
    fn different_length_is_changed() {
        assert!(!is_definitely_unchanged(Some(&dated(10)), &dated(11)));
    }

    #[test]
    fn different_date_is_changed() {
        let remote = ResourceMetadata::new()
            .with_last_modified(modified() + TimeDelta::seconds(1))
            .with_content_length(10);
        assert!(!is_definitely_unchanged(Some(&dated(10)), &remote));
    }

    #[test]
    fn zero_length_is_not_conclusive() {
        assert!(!is_definitely_unchanged(Some(&dated(0)), &dated(0)));
    }

    #[test]
    fn missing_remote_date_is_not_conclusive() {
        let remote = ResourceMetadata::new().with_content_length(10);
        assert!(!is_definitely_unchanged(Some(&dated(10)), &remote));
    }

    #[test]
    fn matching_etag_is_unchanged() {
        let cached = ResourceMetadata::new().with_etag("\"abc\"");
        let remote = ResourceMetadata::new().with_etag("\"abc\"");
        assert!(is_definitely_unchanged(Some(&cached), &remote));
    }

    #[test]
    fn different_etag_wins_over_matching_dates() {
        let cached = dated(10).with_etag("\"abc\"");
        let remote = dated(10).with_etag("\"def\"");
        assert!(!is_definitely_unchanged(Some(&cached), &remote));
    }

    #[test]
    fn one_sided_etag_falls_back_to_dates() {
        let cached = dated(10).with_etag("\"abc\"");
        assert!(is_definitely_unchanged(Some(&cached), &dated(10)));
    }

    #[test]
    fn empty_etags_are_ignored() {
        let cached = ResourceMetadata::new().with_etag("");
        let remote = ResourceMetadata::new().with_etag("");
        assert!(!is_definitely_unchanged(Some(&cached), &remote));
    }

    #[test]
    fn matching_weak_etags_are_not_conclusive() {
        let cached = ResourceMetadata::new().with_etag("W/\"abc\"");
        let remote = ResourceMetadata::new().with_etag("W/\"abc\"");
        assert!(!is_definitely_unchanged(Some(&cached), &remote));
    }

    #[test]
    fn weak_etags_fall_back_to_dates() {
        let cached = dated(10).with_etag("W/\"abc\"");
        assert!(is_definitely_unchanged(Some(&cached), &dated(10).with_etag("W/\"abc\"")));
        assert!(!is_definitely_unchanged(Some(&cached), &dated(11).with_etag("W/\"abc\"")));
    }

    #[test]
    fn matching_etag_with_different_length_is_changed() {
        let cached = ResourceMetadata::new().with_etag("\"abc\"").with_content_length(10);
        let remote = ResourceMetadata::new().with_etag("\"abc\"").with_content_length(12);
        assert!(!is_definitely_unchanged(Some(&cached), &remote));
    }
}
