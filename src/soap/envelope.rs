//! Outbound request envelopes for the two provider operations.
//!
//! Both carry the credentials as plain child elements. The returned strings
//! must never be logged.

use chrono::NaiveDateTime;

const ENVELOPE_OPEN: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<soapenv:Envelope \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" \
xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\" \
xmlns:sch=\"http://hermespardini.com.br/b2b/apoio/schemas\">\n\
  <soapenv:Header/>\n\
  <soapenv:Body>\n";

const ENVELOPE_CLOSE: &str = "  </soapenv:Body>\n</soapenv:Envelope>";

const ENCODING_STYLE: &str = "soapenv:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\"";

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn field(out: &mut String, name: &str, xsd_type: &str, value: &str) {
    out.push_str("      <");
    out.push_str(name);
    out.push_str(" xsi:type=\"xsd:");
    out.push_str(xsd_type);
    out.push_str("\">");
    out.push_str(value);
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}

fn operation(login: &str, passwd: &str, op: &str, body: impl FnOnce(&mut String)) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str(ENVELOPE_OPEN);
    out.push_str("    <sch:");
    out.push_str(op);
    out.push(' ');
    out.push_str(ENCODING_STYLE);
    out.push_str(">\n");
    field(&mut out, "login", "string", &escape_xml(login));
    field(&mut out, "passwd", "string", &escape_xml(passwd));
    body(&mut out);
    out.push_str("    </sch:");
    out.push_str(op);
    out.push_str(">\n");
    out.push_str(ENVELOPE_CLOSE);
    out
}

/// `getResultadoPedido`: single order result by year and provider order code.
pub fn build_order_envelope(
    login: &str,
    passwd: &str,
    year: i32,
    remote_order_code: &str,
    include_pdf: bool,
) -> String {
    operation(login, passwd, "getResultadoPedido", |out| {
        field(out, "anoCodPedApoio", "long", &year.to_string());
        field(out, "CodPedApoio", "string", &escape_xml(remote_order_code));
        field(out, "CodExmApoio", "string", "");
        field(out, "PDF", "long", if include_pdf { "1" } else { "0" });
        field(out, "versaoResultado", "long", "1");
        field(out, "papelTimbrado", "boolean", "false");
        field(out, "valorReferencia", "long", "0");
        field(out, "UnidadeNoValor", "boolean", "false");
    })
}

/// `getResultado`: every result released inside a time window.
pub fn build_period_envelope(
    login: &str,
    passwd: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    include_graphics: bool,
) -> String {
    operation(login, passwd, "getResultado", |out| {
        field(out, "dataInicial", "string", &start.format("%d/%m/%Y").to_string());
        field(out, "horaInicial", "string", &start.format("%H:%M:%S").to_string());
        field(out, "dataFinal", "string", &end.format("%d/%m/%Y").to_string());
        field(out, "horaFinal", "string", &end.format("%H:%M:%S").to_string());
        field(out, "grafico", "long", if include_graphics { "1" } else { "0" });
    })
}
