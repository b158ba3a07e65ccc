//! Just enough XML for the EC2 and S3 responses this adapter reads.
//!
//! AWS query-protocol replies nest `<item>` elements inside `<item>`, so
//! element extraction tracks depth instead of matching lazily.

use regex::Regex;

fn tag_pattern(tag: &str) -> Option<Regex> {
    Regex::new(&format!(r"<(/?){}(?:\s[^>]*?)?(/?)>", regex::escape(tag))).ok()
}

/// Inner text of each outermost `<tag>` element, in document order.
pub fn elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let Some(re) = tag_pattern(tag) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for caps in re.captures_iter(xml) {
        let Some(whole) = caps.get(0) else { continue };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
        if self_closing {
            if depth == 0 {
                found.push("");
            }
        } else if closing {
            if depth == 1 {
                found.push(&xml[start..whole.start()]);
            }
            depth = depth.saturating_sub(1);
        } else {
            if depth == 0 {
                start = whole.end();
            }
            depth += 1;
        }
    }
    found
}

/// First `<tag>` element's inner text.
pub fn element<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    elements(xml, tag).into_iter().next()
}

/// The `<item>` children of the first `<set>` element, e.g. `instancesSet`.
pub fn items<'a>(xml: &'a str, set: &str) -> Vec<&'a str> {
    element(xml, set).map(|s| elements(s, "item")).unwrap_or_default()
}

/// Unescaped text of the first `<tag>` element.
pub fn text(xml: &str, tag: &str) -> Option<String> {
    element(xml, tag).map(unescape)
}

pub fn text_or(xml: &str, tag: &str, default: &str) -> String {
    text(xml, tag).unwrap_or_else(|| default.to_string())
}

/// Decode the five predefined entities and numeric character references.
/// Anything unrecognised is kept as written.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 12)
            .and_then(|end| entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => name.strip_prefix('#')?.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// `Code: Message` from an EC2 or S3 error document.
pub fn error_message(xml: &str) -> Option<String> {
    let code = text(xml, "Code");
    let message = text(xml, "Message");
    match (code, message) {
        (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_named_and_numeric_references() {
        assert_eq!(unescape("a &lt;b&gt; &amp;amp; &quot;c&apos;"), "a <b> &amp; \"c'");
        assert_eq!(unescape("line&#13;&#10;next &#x2F;tmp&#X41;"), "line\r\nnext /tmpA");
        assert_eq!(unescape("AT&T &#xZZ; &bogus; &#1114112;"), "AT&T &#xZZ; &bogus; &#1114112;");
    }

    const INSTANCES: &str = r#"<DescribeInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
        <reservationSet>
            <item>
                <reservationId>r-1</reservationId>
                <instancesSet>
                    <item>
                        <instanceId>i-abc</instanceId>
                        <instanceState><code>16</code><name>running</name></instanceState>
                        <tagSet>
                            <item><key>Name</key><value>web &amp; api</value></item>
                        </tagSet>
                    </item>
                </instancesSet>
            </item>
            <item>
                <reservationId>r-2</reservationId>
                <instancesSet><item><instanceId>i-def</instanceId></item></instancesSet>
            </item>
        </reservationSet>
    </DescribeInstancesResponse>"#;

    #[test]
    fn nested_items_keep_their_boundaries() {
        let reservations = items(INSTANCES, "reservationSet");
        assert_eq!(reservations.len(), 2);

        let instances = items(reservations[0], "instancesSet");
        assert_eq!(instances.len(), 1);
        assert_eq!(text(instances[0], "instanceId").as_deref(), Some("i-abc"));

        let state = element(instances[0], "instanceState").unwrap();
        assert_eq!(text(state, "name").as_deref(), Some("running"));

        let tags = items(instances[0], "tagSet");
        assert_eq!(text(tags[0], "value").as_deref(), Some("web & api"));

        let second = items(reservations[1], "instancesSet");
        assert_eq!(text(second[0], "instanceId").as_deref(), Some("i-def"));
    }

    #[test]
    fn attributes_and_self_closing_tags() {
        let xml = r#"<LocationConstraint xmlns="http://s3.amazonaws.com/doc/2006-03-01/">eu-west-1</LocationConstraint>"#;
        assert_eq!(text(xml, "LocationConstraint").as_deref(), Some("eu-west-1"));
        assert_eq!(text("<LocationConstraint/>", "LocationConstraint").as_deref(), Some(""));
        assert_eq!(text("<Other/>", "LocationConstraint"), None);
    }

    #[test]
    fn similarly_named_tags_do_not_match() {
        let xml = "<Buckets><Bucket><Name>a</Name></Bucket><Bucket><Name>b</Name></Bucket></Buckets>";
        let buckets = elements(xml, "Bucket");
        assert_eq!(buckets.len(), 2);
        assert_eq!(text(buckets[1], "Name").as_deref(), Some("b"));
    }

    #[test]
    fn error_documents() {
        let ec2 = "<Response><Errors><Error><Code>AuthFailure</Code><Message>bad key</Message></Error></Errors></Response>";
        assert_eq!(error_message(ec2).as_deref(), Some("AuthFailure: bad key"));
        assert_eq!(error_message("not xml"), None);
    }
}
