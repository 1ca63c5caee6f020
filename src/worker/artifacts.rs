//! Naming and typing of artifacts before they are attached.

use crate::config::DocumentConfig;
use crate::models::ArtifactKind;
use crate::soap::{Artifact, RemoteResult};

/// One artifact ready to be handed to the sink.
#[derive(Debug, Clone)]
pub struct AttachmentPlan<'a> {
    pub kind: ArtifactKind,
    pub content: &'a [u8],
    pub content_hash: &'a str,
    pub extension: &'static str,
    pub file_name: String,
    pub description: String,
    pub document_type_code: i64,
}

/// Reports first, then graphics, each in response order.
pub fn plan_attachments<'a>(
    result: &'a RemoteResult,
    documents: &DocumentConfig,
) -> Vec<AttachmentPlan<'a>> {
    let key = result.key();
    let mut plans = Vec::with_capacity(result.pdf_artifacts.len() + result.graphic_artifacts.len());
    push_kind(
        &mut plans,
        &key,
        ArtifactKind::Pdf,
        &result.pdf_artifacts,
        documents.report_type_code,
    );
    push_kind(
        &mut plans,
        &key,
        ArtifactKind::Graphic,
        &result.graphic_artifacts,
        documents.graphic_type_code,
    );
    plans
}

fn push_kind<'a>(
    plans: &mut Vec<AttachmentPlan<'a>>,
    key: &str,
    kind: ArtifactKind,
    artifacts: &'a [Artifact],
    document_type_code: i64,
) {
    let total = artifacts.len();
    for (index, artifact) in artifacts.iter().enumerate() {
        let extension = match kind {
            ArtifactKind::Pdf => "PDF",
            ArtifactKind::Graphic => artifact.file_type.extension(),
        };
        plans.push(AttachmentPlan {
            kind,
            content: &artifact.bytes,
            content_hash: &artifact.sha256,
            extension,
            file_name: file_name(kind, key, index, total, extension),
            description: description(kind, key, &artifact.sha256),
            document_type_code,
        });
    }
}

fn label(kind: ArtifactKind) -> (&'static str, &'static str) {
    match kind {
        ArtifactKind::Pdf => ("LAUDO", "Laudo"),
        ArtifactKind::Graphic => ("GRAFICO", "Grafico"),
    }
}

/// `LAUDO_{key}.PDF`, numbered `_{NN}` only when the order has several.
pub fn file_name(kind: ArtifactKind, key: &str, index: usize, total: usize, extension: &str) -> String {
    let (prefix, _) = label(kind);
    if total > 1 {
        format!("{prefix}_{key}_{:02}.{extension}", index + 1)
    } else {
        format!("{prefix}_{key}.{extension}")
    }
}

pub fn description(kind: ArtifactKind, key: &str, content_hash: &str) -> String {
    let (_, title) = label(kind);
    format!("{title} - Pedido {key} [HASH:{content_hash}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FileType;

    fn artifact(bytes: &[u8], hash: &str, file_type: FileType) -> Artifact {
        Artifact {
            bytes: bytes.to_vec(),
            sha256: hash.into(),
            file_type,
        }
    }

    fn documents() -> DocumentConfig {
        DocumentConfig {
            report_type_code: 841,
            graphic_type_code: 842,
            author: "RERONO_API".into(),
            origin: "HERMES PARDINI - HPWS".into(),
        }
    }

    #[test]
    fn single_report_is_not_numbered() {
        let mut result = RemoteResult::new(2025, "778812");
        result.pdf_artifacts.push(artifact(b"%PDF-", "aa", FileType::Pdf));

        let plans = plan_attachments(&result, &documents());
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].file_name, "LAUDO_2025-778812.PDF");
        assert_eq!(plans[0].description, "Laudo - Pedido 2025-778812 [HASH:aa]");
        assert_eq!(plans[0].document_type_code, 841);
    }

    #[test]
    fn several_artifacts_are_numbered_per_kind() {
        let mut result = RemoteResult::new(2024, "9");
        result.pdf_artifacts.push(artifact(b"1", "p1", FileType::Pdf));
        result.pdf_artifacts.push(artifact(b"2", "p2", FileType::Pdf));
        result.graphic_artifacts.push(artifact(b"g", "g1", FileType::Png));

        let plans = plan_attachments(&result, &documents());
        let names: Vec<&str> = plans.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["LAUDO_2024-9_01.PDF", "LAUDO_2024-9_02.PDF", "GRAFICO_2024-9.PNG"]
        );
        assert_eq!(plans[2].kind, ArtifactKind::Graphic);
        assert_eq!(plans[2].extension, "PNG");
        assert_eq!(plans[2].document_type_code, 842);
        assert_eq!(plans[2].description, "Grafico - Pedido 2024-9 [HASH:g1]");
    }
}
