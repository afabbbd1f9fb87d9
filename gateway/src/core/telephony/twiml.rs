//! TwiML documents returned from the call-control webhook.

/// Escape text for use in XML content and attribute values.
pub fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the TwiML that connects a call to our media stream endpoint.
///
/// The optional fallback is spoken if the stream ends while the call is
/// still up.
pub fn connect_stream(greeting: &str, stream_url: &str, fallback: Option<&str>) -> String {
    let mut twiml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n");

    if !greeting.is_empty() {
        twiml.push_str(&format!("  <Say>{}</Say>\n", xml_escape(greeting)));
    }

    twiml.push_str(&format!(
        "  <Connect>\n    <Stream url=\"{}\" />\n  </Connect>\n",
        xml_escape(stream_url)
    ));

    if let Some(fallback) = fallback.filter(|f| !f.is_empty()) {
        twiml.push_str(&format!("  <Say>{}</Say>\n", xml_escape(fallback)));
    }

    twiml.push_str("</Response>");
    twiml
}
