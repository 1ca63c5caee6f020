use crate::codec::{classify, decode_base64, sha256_hex, FileType};

use super::scanner::{extract_all, extract_non_empty, fault_message, is_fault};
use super::types::{Artifact, RemoteResult};

pub const PDF_TAG: &str = "PDF";
pub const GRAPHIC_TAG: &str = "Grafico";
pub const RETURN_CODE_TAG: &str = "CodigoRetorno";
pub const ERROR_MESSAGE_TAG: &str = "MensagemErro";

/// Classify an order-result body and extract its artifacts.
///
/// A fault short-circuits extraction. Otherwise success means at least one
/// artifact was decoded, or the provider sent no error message.
pub fn parse_order_response(xml: &str, year: i32, remote_order_code: &str) -> RemoteResult {
    let mut result = RemoteResult::new(year, remote_order_code);
    result.raw_response = xml.to_string();

    if is_fault(xml) {
        let message = fault_message(xml);
        tracing::warn!(order = %result.key(), fault = %message, "Provider returned a fault");
        result.error_message = Some(message);
        return result;
    }

    result.pdf_artifacts = decode_occurrences(xml, PDF_TAG, &result.key());
    result.graphic_artifacts = decode_occurrences(xml, GRAPHIC_TAG, &result.key());

    for (index, pdf) in result.pdf_artifacts.iter().enumerate() {
        if pdf.file_type != FileType::Pdf {
            tracing::warn!(
                order = %result.key(),
                index,
                detected = pdf.file_type.extension(),
                "PDF field content does not look like a PDF"
            );
        }
    }

    result.return_code = extract_non_empty(xml, RETURN_CODE_TAG);
    result.error_message = extract_non_empty(xml, ERROR_MESSAGE_TAG);
    result.success = result.has_artifacts() || result.error_message.is_none();
    result
}

/// Decode every non-empty occurrence of `tag`. Undecodable ones are skipped.
fn decode_occurrences(xml: &str, tag: &str, key: &str) -> Vec<Artifact> {
    extract_all(xml, tag)
        .into_iter()
        .enumerate()
        .filter(|(_, raw)| !raw.is_empty())
        .filter_map(|(index, raw)| match decode_base64(&raw) {
            Ok(bytes) => {
                let sha256 = sha256_hex(&bytes)?;
                Some(Artifact {
                    file_type: classify(&bytes),
                    sha256,
                    bytes,
                })
            }
            Err(e) => {
                tracing::warn!(order = %key, tag, index, error = %e, "Skipping undecodable field");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_base64;

    fn body(inner: &str) -> String {
        format!(
            "<soap:Envelope><soap:Body><ns:getResultadoPedidoResponse>{inner}\
             </ns:getResultadoPedidoResponse></soap:Body></soap:Envelope>"
        )
    }

    #[test]
    fn three_pdfs_in_document_order() {
        let docs: [&[u8]; 3] = [b"%PDF-1.4 a", b"%PDF-1.4 b", b"%PDF-1.4 c"];
        let inner: String = docs
            .iter()
            .map(|d| format!("<PDF>{}</PDF>", encode_base64(d)))
            .collect();
        let result = parse_order_response(&body(&inner), 2025, "42");

        assert!(result.success);
        assert_eq!(result.pdf_artifacts.len(), 3);
        for (artifact, expected) in result.pdf_artifacts.iter().zip(docs) {
            assert_eq!(artifact.bytes, expected);
            assert_eq!(artifact.sha256, sha256_hex(expected).unwrap());
            assert_eq!(artifact.file_type, FileType::Pdf);
        }
    }

    #[test]
    fn graphics_are_classified() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2];
        let xml = body(&format!("<Grafico>{}</Grafico>", encode_base64(&png)));
        let result = parse_order_response(&xml, 2025, "42");
        assert_eq!(result.graphic_artifacts.len(), 1);
        assert_eq!(result.graphic_artifacts[0].file_type, FileType::Png);
        assert!(result.pdf_artifacts.is_empty());
    }

    #[test]
    fn fault_short_circuits() {
        let xml = format!(
            "<soap:Envelope><soap:Body><soap:Fault><faultstring>Pedido inexistente</faultstring>\
             </soap:Fault><PDF>{}</PDF></soap:Body></soap:Envelope>",
            encode_base64(b"%PDF-1.4")
        );
        let result = parse_order_response(&xml, 2025, "42");
        assert!(!result.success);
        assert!(result.pdf_artifacts.is_empty());
        assert_eq!(result.error_message.as_deref(), Some("Pedido inexistente"));
    }

    #[test]
    fn empty_result_without_error_is_success() {
        let result = parse_order_response(&body("<CodigoRetorno>0</CodigoRetorno><PDF/>"), 2025, "42");
        assert!(result.success);
        assert!(!result.has_artifacts());
        assert_eq!(result.return_code.as_deref(), Some("0"));
    }

    #[test]
    fn error_message_without_artifacts_is_failure() {
        let result = parse_order_response(
            &body("<CodigoRetorno>9</CodigoRetorno><MensagemErro>Resultado nao liberado</MensagemErro>"),
            2025,
            "42",
        );
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("Resultado nao liberado"));
    }

    #[test]
    fn artifacts_win_over_error_message() {
        let xml = body(&format!(
            "<PDF>{}</PDF><MensagemErro>parcial</MensagemErro>",
            encode_base64(b"%PDF-1.4")
        ));
        let result = parse_order_response(&xml, 2025, "42");
        assert!(result.success);
        assert_eq!(result.error_message.as_deref(), Some("parcial"));
    }

    #[test]
    fn bad_occurrence_is_skipped_not_fatal() {
        let xml = body(&format!(
            "<PDF>***</PDF><PDF>{}</PDF>",
            encode_base64(b"%PDF-1.4 ok")
        ));
        let result = parse_order_response(&xml, 2025, "42");
        assert!(result.success);
        assert_eq!(result.pdf_artifacts.len(), 1);
        assert_eq!(result.pdf_artifacts[0].bytes, b"%PDF-1.4 ok");
    }

    #[test]
    fn raw_response_is_kept() {
        let xml = body("<CodigoRetorno>0</CodigoRetorno>");
        let result = parse_order_response(&xml, 2025, "42");
        assert_eq!(result.raw_response, xml);
    }
}
