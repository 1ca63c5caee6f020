//! Tolerant tag scanner for provider responses.
//!
//! Responses are not schema-validated. The scanner walks the raw text looking
//! for start tags whose local name (namespace prefix ignored) matches,
//! case-insensitively, and returns the text up to the matching end tag.
//! Repeated tags yield every occurrence in document order.

/// One located element: byte range of its content inside the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Start tag parsed at a `<` position.
struct StartTag {
    local_name_start: usize,
    local_name_end: usize,
    /// Index just past the closing `>`.
    after: usize,
    self_closing: bool,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':')
}

/// Parse a start tag beginning at `lt` (which must point at `<`).
/// Returns `None` for end tags, comments, declarations and unterminated tags.
fn parse_start_tag(bytes: &[u8], lt: usize) -> Option<StartTag> {
    let name_start = lt + 1;
    let first = *bytes.get(name_start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut name_end = name_start;
    while name_end < bytes.len() && is_name_byte(bytes[name_end]) {
        name_end += 1;
    }
    let local_name_start = bytes[name_start..name_end]
        .iter()
        .rposition(|b| *b == b':')
        .map(|i| name_start + i + 1)
        .unwrap_or(name_start);

    // Attributes may contain '>' inside quotes.
    let mut i = name_end;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => {
                let self_closing = i > name_end && bytes[i - 1] == b'/';
                return Some(StartTag {
                    local_name_start,
                    local_name_end: name_end,
                    after: i + 1,
                    self_closing,
                });
            }
            None => {}
        }
        i += 1;
    }
    None
}

/// Find the end tag `</[prefix:]name>` at or after `from`.
/// Returns (index of `<`, index just past `>`).
fn find_end_tag(bytes: &[u8], name: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'<' && bytes[i + 1] == b'/' {
            let name_start = i + 2;
            let mut name_end = name_start;
            while name_end < bytes.len() && is_name_byte(bytes[name_end]) {
                name_end += 1;
            }
            let local_start = bytes[name_start..name_end]
                .iter()
                .rposition(|b| *b == b':')
                .map(|p| name_start + p + 1)
                .unwrap_or(name_start);
            if bytes[local_start..name_end].eq_ignore_ascii_case(name) {
                let mut j = name_end;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if bytes.get(j) == Some(&b'>') {
                    return Some((i, j + 1));
                }
            }
            i = name_end.max(i + 2);
        } else {
            i += 1;
        }
    }
    None
}

/// All element spans for `tag`, in document order.
pub fn find_all(xml: &str, tag: &str) -> Vec<Span> {
    let bytes = xml.as_bytes();
    let name = tag.as_bytes();
    let mut spans = Vec::new();
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|b| *b == b'<') {
        let lt = pos + offset;
        let Some(start) = parse_start_tag(bytes, lt) else {
            pos = lt + 1;
            continue;
        };
        if !bytes[start.local_name_start..start.local_name_end].eq_ignore_ascii_case(name) {
            pos = lt + 1;
            continue;
        }
        if start.self_closing {
            spans.push(Span {
                start: start.after,
                end: start.after,
            });
            pos = start.after;
            continue;
        }
        match find_end_tag(bytes, name, start.after) {
            Some((close_lt, close_after)) => {
                spans.push(Span {
                    start: start.after,
                    end: close_lt,
                });
                pos = close_after;
            }
            // Unterminated element: nothing further can match.
            None => break,
        }
    }
    spans
}

/// Trimmed raw contents of every `tag` element, in document order.
pub fn extract_all(xml: &str, tag: &str) -> Vec<String> {
    find_all(xml, tag)
        .into_iter()
        .map(|span| xml[span.start..span.end].trim().to_string())
        .collect()
}

/// Trimmed, entity-decoded text of the first `tag` element.
pub fn extract_text(xml: &str, tag: &str) -> Option<String> {
    find_all(xml, tag)
        .first()
        .map(|span| decode_entities(xml[span.start..span.end].trim()))
}

/// Like `extract_text` but treats an empty element as absent.
pub fn extract_non_empty(xml: &str, tag: &str) -> Option<String> {
    extract_text(xml, tag).filter(|s| !s.is_empty())
}

/// True when a start tag with this local name appears anywhere.
pub fn has_element(xml: &str, tag: &str) -> bool {
    let bytes = xml.as_bytes();
    let name = tag.as_bytes();
    let mut pos = 0;
    while let Some(offset) = bytes[pos..].iter().position(|b| *b == b'<') {
        let lt = pos + offset;
        if let Some(start) = parse_start_tag(bytes, lt) {
            if bytes[start.local_name_start..start.local_name_end].eq_ignore_ascii_case(name) {
                return true;
            }
        }
        pos = lt + 1;
    }
    false
}

/// Decode the five predefined XML entities.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Drop markup, keeping text content separated by single spaces.
pub fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    decode_entities(&out.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// A payload is a fault document when it carries a `Fault` element under any
/// prefix, or a bare `faultstring`.
pub fn is_fault(xml: &str) -> bool {
    has_element(xml, "Fault") || has_element(xml, "faultstring")
}

/// Human-readable fault description.
pub fn fault_message(xml: &str) -> String {
    let base = extract_non_empty(xml, "faultstring").unwrap_or_else(|| "remote fault".to_string());
    let info = extract_non_empty(xml, "info").or_else(|| {
        find_all(xml, "detail")
            .first()
            .map(|span| strip_tags(&xml[span.start..span.end]))
            .filter(|s| !s.is_empty())
    });
    match info {
        Some(extra) => format!("{base} ({extra})"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_tags_in_document_order() {
        let xml = "<r><PDF>one</PDF><x/><pdf>two</pdf><Pdf attr=\"1\"> three </Pdf></r>";
        assert_eq!(extract_all(xml, "PDF"), vec!["one", "two", "three"]);
    }

    #[test]
    fn namespace_prefix_is_ignored() {
        let xml = "<ns1:CodigoRetorno xsi:type=\"xsd:string\">00</ns1:CodigoRetorno>";
        assert_eq!(extract_text(xml, "codigoretorno").as_deref(), Some("00"));
    }

    #[test]
    fn self_closing_tag_is_empty_occurrence() {
        let xml = "<a><PDF/><PDF xsi:nil=\"true\" /><PDF>x</PDF></a>";
        assert_eq!(extract_all(xml, "PDF"), vec!["", "", "x"]);
        assert_eq!(extract_non_empty("<MensagemErro/>", "MensagemErro"), None);
    }

    #[test]
    fn prefix_of_longer_tag_does_not_match() {
        let xml = "<PDFs>nope</PDFs><PDFx>no</PDFx>";
        assert!(extract_all(xml, "PDF").is_empty());
    }

    #[test]
    fn quoted_gt_in_attribute() {
        let xml = "<PDF note=\"a>b\">data</PDF>";
        assert_eq!(extract_all(xml, "PDF"), vec!["data"]);
    }

    #[test]
    fn unterminated_element_is_ignored() {
        assert!(extract_all("<PDF>abc", "PDF").is_empty());
    }

    #[test]
    fn entities_are_decoded_in_text() {
        let xml = "<MensagemErro>Pedido &lt;1&gt; &amp;amp; &quot;x&quot;</MensagemErro>";
        assert_eq!(
            extract_text(xml, "MensagemErro").as_deref(),
            Some("Pedido <1> &amp; \"x\"")
        );
    }

    #[test]
    fn fault_detection_with_any_prefix() {
        assert!(is_fault("<soap:Envelope><soap:Body><soap:Fault/></soap:Body></soap:Envelope>"));
        assert!(is_fault("<SOAP-ENV:fault><faultcode>x</faultcode></SOAP-ENV:fault>"));
        assert!(is_fault("<faultstring>boom</faultstring>"));
        assert!(!is_fault("<Resultado><PDF>JVBERi0x</PDF></Resultado>"));
        assert!(!is_fault("<FaultTolerant>no</FaultTolerant>"));
    }

    #[test]
    fn fault_message_variants() {
        assert_eq!(
            fault_message("<Fault><faultstring>Login invalido</faultstring><info>codigo 12</info></Fault>"),
            "Login invalido (codigo 12)"
        );
        assert_eq!(
            fault_message("<Fault><faultstring>Erro</faultstring><detail><e>linha 3</e></detail></Fault>"),
            "Erro (linha 3)"
        );
        assert_eq!(fault_message("<Fault></Fault>"), "remote fault");
    }
}
