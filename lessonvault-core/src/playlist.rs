//! Mobile-audience HLS playlist rewriting.
//!
//! Mobile players cannot attach an `Authorization` header to the
//! sub-requests they issue for keys and segments, so the manifest itself
//! carries the credential instead: every `#EXT-X-KEY` URI and every
//! segment URI gets a `?token=<presented>` suffix. Line-walking approach
//! ported from the teacher's `rewrite_m3u8`/`rewrite_uri_attribute`
//! (`synctv-proxy/src/lib.rs`), adapted from "proxy through us" to
//! "append the caller's own credential".

/// Rewrite `manifest` so every key and segment reference resolves back
/// through `base` (the mobile route's absolute URL prefix, no trailing
/// slash) carrying `token` as a query parameter. Non-key, non-segment
/// lines (including blank lines and `#EXTM3U`/`#EXT-X-*` metadata that
/// isn't a key tag) pass through unchanged.
#[must_use]
pub fn rewrite_for_mobile(manifest: &str, base: &str, token: &str) -> String {
    let mut output = String::with_capacity(manifest.len() + manifest.len() / 4);

    for line in manifest.lines() {
        if line.starts_with("#EXT-X-KEY") {
            output.push_str(&rewrite_key_line(line, base, token));
        } else if is_segment_line(line) {
            output.push_str(&format!("{base}/{line}?token={token}"));
        } else {
            output.push_str(line);
        }
        output.push('\n');
    }

    output
}

fn is_segment_line(line: &str) -> bool {
    !line.is_empty() && !line.starts_with('#') && line.ends_with(".ts")
}

/// Replace the value of the `URI="..."` attribute on an `#EXT-X-KEY` line.
fn rewrite_key_line(line: &str, base: &str, token: &str) -> String {
    let Some(uri_start) = line.find("URI=\"") else {
        return line.to_string();
    };
    let value_start = uri_start + "URI=\"".len();
    let Some(value_len) = line[value_start..].find('"') else {
        return line.to_string();
    };

    let mut rewritten = String::with_capacity(line.len() + base.len() + token.len());
    rewritten.push_str(&line[..value_start]);
    rewritten.push_str(&format!("{base}/key?token={token}"));
    rewritten.push_str(&line[value_start + value_len..]);
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_key_and_segment_lines() {
        let manifest = "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"https://old/key\"\nsegment_000.ts\nsegment_001.ts\n";
        let rewritten = rewrite_for_mobile(manifest, "https://host/mobile/hls/u1/v1", "tok123");

        assert!(rewritten.contains("URI=\"https://host/mobile/hls/u1/v1/key?token=tok123\""));
        assert!(rewritten.contains("https://host/mobile/hls/u1/v1/segment_000.ts?token=tok123"));
        assert!(rewritten.contains("https://host/mobile/hls/u1/v1/segment_001.ts?token=tok123"));
        assert!(rewritten.starts_with("#EXTM3U\n"));
    }

    #[test]
    fn passes_through_unrelated_lines() {
        let manifest = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n";
        let rewritten = rewrite_for_mobile(manifest, "https://host/x", "tok");
        assert_eq!(rewritten, manifest);
    }

    #[test]
    fn blank_lines_pass_through() {
        let manifest = "#EXTM3U\n\nsegment_000.ts\n";
        let rewritten = rewrite_for_mobile(manifest, "https://host/x", "tok");
        assert!(rewritten.contains("\n\n"));
    }

    #[test]
    fn no_relative_uri_survives_rewrite() {
        let manifest = "#EXT-X-KEY:METHOD=AES-128,URI=\"key\"\nseg.ts\n";
        let rewritten = rewrite_for_mobile(manifest, "https://host/base", "tok");
        for line in rewritten.lines() {
            if line.contains("URI=") {
                assert!(line.contains("https://host/base/key?token=tok"));
            }
        }
    }
}
