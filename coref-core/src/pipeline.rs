//! # Pipeline de Correferência — Orquestrador com Eventos Observáveis
//!
//! O pipeline processa um [`Document`] de ponta a ponta:
//!
//! 1. **Alinhamento** ([`crate::align`]): casa os dois fluxos de tokens.
//! 2. **Fusão** ([`crate::merge`]): um [`FeatureRecord`] por token primário, com
//!    features secundárias, morfologia e grupos de correferência.
//! 3. **Floresta** ([`crate::tree`]): árvore de dependências do fluxo secundário.
//! 4. **Menções** ([`crate::mention`]): subárvores com núcleo nominal.
//!
//! Cada etapa emite um [`PipelineEvent`] por um canal `mpsc`, o que permite ao
//! servidor WebSocket transmitir o progresso em tempo real.
//!
//! ## Lote
//!
//! Documentos não compartilham estado, então [`run_batch`] os processa em
//! paralelo com `rayon`. Um documento com erro fatal (árvore corrompida, token
//! ausente) vira [`DocumentOutcome::Skipped`] e o lote continua. O progresso é
//! reportado por um [`ProgressSink`] passado explicitamente.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::align::{Aligner, Alignment, MatchKind};
use crate::bcubed::{BCubed, BCubedScores, ClusterAssignment, EmptyPartnerPolicy};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::mention::{compare_mentions, index_records, Mention, MentionComparison, MentionExtractor};
use crate::merge::{accumulate_groups, merge_annotations, CorefGroup, GroupStats};
use crate::morphology::{MorphologyOracle, PunctuationOracle};
use crate::record::{sort_by_offset, FeatureRecord, TokenAnnotation};
use crate::tree::DependencyForest;

/// Um documento com seus dois fluxos e a tabela de grupos.
///
/// O fluxo secundário carrega os offsets dos pais (`ParentOffset`), usados
/// para montar a floresta de dependências.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub primary: Vec<TokenAnnotation>,
    #[serde(default)]
    pub secondary: Vec<TokenAnnotation>,
    #[serde(default)]
    pub groups: Vec<CorefGroup>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Resultado do processamento de um documento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub doc_id: String,
    /// Registros fundidos, em ordem de offset.
    pub records: Vec<FeatureRecord>,
    pub alignment: Alignment,
    /// Offset secundário → offset do registro primário casado. Núcleos de
    /// menção vivem no espaço secundário e são traduzidos por aqui.
    #[serde(default)]
    pub secondary_to_primary: BTreeMap<i64, i64>,
    pub mentions: Vec<Mention>,
    pub group_stats: GroupStats,
    /// Avisos não fatais (tokens sem par, offsets de grupo desconhecidos).
    pub warnings: Vec<String>,
}

impl DocumentReport {
    /// Linhas de saída dos registros, na ordem canônica de campos.
    pub fn render_records(&self, config: &PipelineConfig) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.render(config.delimiter, &config.sentinel))
            .collect()
    }

    /// Linhas do dataset do classificador (só tokens elegíveis).
    pub fn dataset_rows(&self, config: &PipelineConfig) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.dataset_row(&config.sentinel))
            .collect()
    }

    pub fn mention_texts(&self) -> Vec<&str> {
        self.mentions.iter().map(|m| m.text.as_str()).collect()
    }

    /// Registro primário do núcleo de uma menção, se o núcleo foi alinhado.
    pub fn head_record(&self, mention: &Mention) -> Option<&FeatureRecord> {
        let offset = self.secondary_to_primary.get(&mention.head)?;
        self.records.iter().find(|r| r.offset == *offset)
    }
}

/// Eventos emitidos pelo pipeline durante o processamento de um documento.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    /// **Passo 1**: fluxos alinhados.
    AlignmentDone {
        alignment: Alignment,
        matched: usize,
        unmatched: usize,
        dropped_secondary: usize,
    },
    /// **Passo 2**: registros fundidos e grupos acumulados.
    RecordsMerged {
        records: Vec<FeatureRecord>,
        group_stats: GroupStats,
    },
    /// **Passo 3**: floresta de dependências montada.
    ForestBuilt { roots: Vec<i64>, nodes: usize },
    /// **Passo 4** (um por menção).
    MentionExtracted { mention: Mention },
    /// **Conclusão**.
    Done {
        doc_id: String,
        total_records: usize,
        total_mentions: usize,
        processing_ms: u64,
    },
    /// **Falha**: o documento não pôde ser processado.
    Error { message: String },
}

/// O pipeline de correferência.
///
/// - **Sync**: [`CorefPipeline::process`] devolve o relatório.
/// - **Streaming**: [`CorefPipeline::process_streaming`] empurra eventos pelo canal.
#[derive(Clone)]
pub struct CorefPipeline {
    config: PipelineConfig,
    oracle: Arc<dyn MorphologyOracle>,
}

impl Default for CorefPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl CorefPipeline {
    /// Pipeline com o oráculo padrão (só pontuação).
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            oracle: Arc::new(PunctuationOracle),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn MorphologyOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processa o documento e devolve o relatório.
    pub fn process(&self, doc: &Document) -> Result<DocumentReport> {
        self.run(doc, &mut |_: PipelineEvent| {})
    }

    /// Processa o documento enviando eventos de progresso pelo canal `tx`.
    ///
    /// # Fluxo de Eventos
    /// 1. `AlignmentDone`
    /// 2. `RecordsMerged`
    /// 3. `ForestBuilt`
    /// 4. `MentionExtracted` (um por menção)
    /// 5. `Done`, ou `Error` se o documento tiver erro fatal.
    pub fn process_streaming(&self, doc: &Document, tx: mpsc::Sender<PipelineEvent>) {
        let result = self.run(doc, &mut |event: PipelineEvent| {
            let _ = tx.send(event);
        });
        if let Err(err) = result {
            let _ = tx.send(PipelineEvent::Error {
                message: err.to_string(),
            });
        }
    }

    fn run(&self, doc: &Document, emit: &mut dyn FnMut(PipelineEvent)) -> Result<DocumentReport> {
        let start = Instant::now();
        let normalize = self.config.normalize_unicode;
        let mut warnings = Vec::new();

        // === Passo 1: Alinhamento ===
        let alignment = Aligner::from_config(&self.config).align(&doc.primary, &doc.secondary);
        for entry in alignment.entries.iter().filter(|e| e.kind == MatchKind::Unmatched) {
            for i in entry.primary.clone() {
                let token = &doc.primary[i].token;
                debug!(doc = %doc.id, offset = token.offset, text = %token.text, "token sem par");
                warnings.push(format!("token {} `{}` sem par no fluxo secundário", token.offset, token.text));
            }
        }
        emit(PipelineEvent::AlignmentDone {
            matched: alignment.entries.iter().filter(|e| e.is_matched()).map(|e| e.primary.len()).sum(),
            unmatched: alignment.unmatched_primary(),
            dropped_secondary: alignment.dropped_secondary.len(),
            alignment: alignment.clone(),
        });

        let secondary_to_primary: BTreeMap<i64, i64> = alignment
            .secondary_to_primary()
            .into_iter()
            .map(|(j, i)| (doc.secondary[j].offset(), doc.primary[i].offset()))
            .collect();

        // === Passo 2: Fusão ===
        let mut records = merge_annotations(
            &doc.primary,
            &doc.secondary,
            &alignment,
            Some(self.oracle.as_ref()),
            normalize,
        );
        let group_stats = accumulate_groups(&mut records, &doc.groups);
        for (group, offset) in &group_stats.unknown_offsets {
            warnings.push(format!("grupo {group} cita offset {offset} inexistente"));
        }
        sort_by_offset(&mut records);
        emit(PipelineEvent::RecordsMerged {
            records: records.clone(),
            group_stats: group_stats.clone(),
        });

        // === Passo 3: Floresta ===
        let forest = DependencyForest::from_annotations(&doc.secondary)?;
        emit(PipelineEvent::ForestBuilt {
            roots: forest.roots().map(|n| n.id).collect(),
            nodes: forest.len(),
        });

        // === Passo 4: Menções ===
        let secondary_records: Vec<FeatureRecord> = doc
            .secondary
            .iter()
            .map(|a| FeatureRecord::from_secondary(a, normalize))
            .collect();
        let index = index_records(&secondary_records);
        let mentions = MentionExtractor::from_config(&self.config).extract(&forest, &index)?;
        for mention in &mentions {
            emit(PipelineEvent::MentionExtracted {
                mention: mention.clone(),
            });
        }

        emit(PipelineEvent::Done {
            doc_id: doc.id.clone(),
            total_records: records.len(),
            total_mentions: mentions.len(),
            processing_ms: start.elapsed().as_millis() as u64,
        });

        Ok(DocumentReport {
            doc_id: doc.id.clone(),
            records,
            alignment,
            secondary_to_primary,
            mentions,
            group_stats,
            warnings,
        })
    }

    /// Processa um lote em paralelo. A ordem dos resultados é a da entrada.
    pub fn run_batch(&self, documents: &[Document], sink: &dyn ProgressSink) -> BatchReport {
        let total = documents.len();
        let done = AtomicUsize::new(0);

        let outcomes: Vec<DocumentOutcome> = documents
            .par_iter()
            .map(|doc| {
                let outcome = match self.process(doc) {
                    Ok(report) => DocumentOutcome::Processed(report),
                    Err(err) => {
                        warn!(doc = %doc.id, error = %err, "documento ignorado");
                        DocumentOutcome::Skipped {
                            doc_id: doc.id.clone(),
                            reason: err.to_string(),
                        }
                    }
                };
                sink.report(&Progress {
                    done: done.fetch_add(1, Ordering::SeqCst) + 1,
                    total,
                    doc_id: doc.id.clone(),
                    skipped: outcome.is_skipped(),
                });
                outcome
            })
            .collect();

        let summary = BatchSummary::from_outcomes(&outcomes);
        sink.finish(&summary);
        BatchReport { outcomes, summary }
    }
}

/// Processa um documento com a configuração dada e o oráculo padrão.
pub fn process_document(doc: &Document, config: &PipelineConfig) -> Result<DocumentReport> {
    CorefPipeline::new(config.clone()).process(doc)
}

/// Processa um lote de documentos com a configuração dada.
pub fn run_batch(documents: &[Document], config: &PipelineConfig, sink: &dyn ProgressSink) -> BatchReport {
    CorefPipeline::new(config.clone()).run_batch(documents, sink)
}

// ===== LOTE =====

/// Resultado de um documento dentro de um lote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Processed(DocumentReport),
    Skipped { doc_id: String, reason: String },
}

impl DocumentOutcome {
    pub fn doc_id(&self) -> &str {
        match self {
            DocumentOutcome::Processed(report) => &report.doc_id,
            DocumentOutcome::Skipped { doc_id, .. } => doc_id,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DocumentOutcome::Skipped { .. })
    }
}

/// Progresso após cada documento concluído (processado ou ignorado).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub doc_id: String,
    pub skipped: bool,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 * 100.0 / self.total as f64
        }
    }
}

/// Totais de um lote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub records: usize,
    pub mentions: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[DocumentOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome {
                DocumentOutcome::Processed(report) => {
                    summary.processed += 1;
                    summary.records += report.records.len();
                    summary.mentions += report.mentions.len();
                }
                DocumentOutcome::Skipped { .. } => summary.skipped += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<DocumentOutcome>,
    pub summary: BatchSummary,
}

/// Eventos de um lote, para quem prefere consumir o progresso por canal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BatchEvent {
    Progress(Progress),
    Finished(BatchSummary),
}

/// Destino do progresso de um lote. É chamado de várias threads.
pub trait ProgressSink: Sync {
    fn report(&self, progress: &Progress);

    fn finish(&self, _summary: &BatchSummary) {}
}

impl ProgressSink for mpsc::Sender<BatchEvent> {
    fn report(&self, progress: &Progress) {
        let _ = self.send(BatchEvent::Progress(progress.clone()));
    }

    fn finish(&self, summary: &BatchSummary) {
        let _ = self.send(BatchEvent::Finished(summary.clone()));
    }
}

/// Registra o progresso no log (`info`), destacando documentos ignorados.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, p: &Progress) {
        if p.skipped {
            warn!("{}/{} ({:.2}%) doc={} IGNORADO", p.done, p.total, p.percent(), p.doc_id);
        } else {
            info!("{}/{} ({:.2}%) doc={}", p.done, p.total, p.percent(), p.doc_id);
        }
    }

    fn finish(&self, s: &BatchSummary) {
        info!(
            processed = s.processed,
            skipped = s.skipped,
            mentions = s.mentions,
            "lote concluído"
        );
    }
}

// ===== AVALIAÇÃO =====

/// Avaliação das menções de um documento contra a tabela de referência.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEvaluation {
    pub comparison: MentionComparison,
    pub scores: BCubedScores,
}

/// Atribuição prevista: cada menção extraída recebe as cadeias acumuladas no
/// registro primário do seu núcleo. Menções cujo núcleo não está em nenhuma
/// cadeia (ou não foi alinhado) formam um cluster unitário.
pub fn predicted_assignment(report: &DocumentReport) -> ClusterAssignment {
    let mut assignment = ClusterAssignment::new();
    for mention in &report.mentions {
        match report.head_record(mention).filter(|r| r.is_mentioned()) {
            Some(record) => {
                for chain in &record.chain_ids {
                    assignment.insert(mention.text.as_str(), chain.as_str());
                }
            }
            None => assignment.insert(mention.text.as_str(), format!("singleton:{}", mention.head)),
        }
    }
    assignment
}

/// Compara e pontua as menções do relatório contra pares `(cadeia, menção)`.
pub fn evaluate_report(
    report: &DocumentReport,
    gold: &[(String, String)],
    policy: EmptyPartnerPolicy,
) -> DocumentEvaluation {
    let predicted = predicted_assignment(report);
    let gold_assignment = ClusterAssignment::from_pairs(gold.iter().cloned());
    DocumentEvaluation {
        comparison: compare_mentions(report.mention_texts(), gold.iter().map(|(_, m)| m)),
        scores: BCubed::new(&predicted, &gold_assignment)
            .with_policy(policy)
            .scores(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{demo_document, demo_gold_mentions};
    use crate::features::keys;
    use std::sync::Mutex;

    #[test]
    fn test_demo_document_end_to_end() {
        let report = process_document(&demo_document(), &PipelineConfig::default()).unwrap();

        assert_eq!(report.records.len(), 10);
        assert_eq!(report.alignment.count(MatchKind::Negation), 1);
        assert_eq!(report.alignment.count(MatchKind::Split), 1);
        assert_eq!(report.alignment.unmatched_primary(), 0);

        assert_eq!(
            report.mention_texts(),
            vec!["Мальчик", "книгу брата", "Он", "не медийное ток - шоу"]
        );

        let brata = report.records.iter().find(|r| r.offset == 20).unwrap();
        assert_eq!(brata.group_ids, vec!["3", "4"]);
        assert_eq!(brata.chain_ids, vec!["2", "3"]);
        assert_eq!(brata.semantic_class.as_deref(), Some("BROTHER(1402)"));
    }

    #[test]
    fn test_rendered_records_use_sentinel() {
        let config = PipelineConfig::default();
        let report = process_document(&demo_document(), &config).unwrap();
        let lines = report.render_records(&config);
        assert_eq!(lines[1], "8\tчитал\tVERB,impf,tran masc,sing,past,indc\tTO_READ(3310)\t-\t$Predicate(1)\tVerb(3)\t-\t-\t-");
        assert!(report.dataset_rows(&config).iter().all(|row| !row.contains("PNCT")));
    }

    #[test]
    fn test_streaming_event_order() {
        let (tx, rx) = mpsc::channel();
        CorefPipeline::default().process_streaming(&demo_document(), tx);
        let kinds: Vec<&'static str> = rx
            .iter()
            .map(|event| match event {
                PipelineEvent::AlignmentDone { .. } => "alignment",
                PipelineEvent::RecordsMerged { .. } => "merged",
                PipelineEvent::ForestBuilt { .. } => "forest",
                PipelineEvent::MentionExtracted { .. } => "mention",
                PipelineEvent::Done { .. } => "done",
                PipelineEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(kinds, vec!["alignment", "merged", "forest", "mention", "mention", "mention", "mention", "done"]);
    }

    fn broken_document(id: &str) -> Document {
        let mut doc = Document::new(id);
        doc.primary = vec![TokenAnnotation::new("он", 0)];
        doc.secondary = vec![TokenAnnotation::new("он", 0).with_feature(keys::PARENT_OFFSET, "99")];
        doc
    }

    #[test]
    fn test_streaming_reports_error() {
        let (tx, rx) = mpsc::channel();
        CorefPipeline::default().process_streaming(&broken_document("x"), tx);
        let last = rx.iter().last().unwrap();
        assert!(matches!(last, PipelineEvent::Error { .. }));
    }

    struct Collect(Mutex<Vec<Progress>>);

    impl ProgressSink for Collect {
        fn report(&self, progress: &Progress) {
            self.0.lock().unwrap().push(progress.clone());
        }
    }

    #[test]
    fn test_batch_skips_broken_document_and_keeps_going() {
        let mut second = demo_document();
        second.id = "demo-2".to_string();
        let docs = vec![demo_document(), broken_document("ruim"), second];

        let sink = Collect(Mutex::new(Vec::new()));
        let report = run_batch(&docs, &PipelineConfig::default(), &sink);

        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.doc_id()).collect();
        assert_eq!(ids, vec!["demo", "ruim", "demo-2"]);
        assert!(report.outcomes[1].is_skipped());
        assert_eq!(report.summary.processed, 2);
        assert_eq!(report.summary.skipped, 1);

        let progress = sink.0.into_inner().unwrap();
        assert_eq!(progress.len(), 3);
        let mut done: Vec<usize> = progress.iter().map(|p| p.done).collect();
        done.sort_unstable();
        assert_eq!(done, vec![1, 2, 3]);
        assert!(progress.iter().any(|p| p.skipped && p.doc_id == "ruim"));
    }

    #[test]
    fn test_batch_over_channel_ends_with_summary() {
        let (tx, rx) = mpsc::channel::<BatchEvent>();
        run_batch(&[demo_document()], &PipelineConfig::default(), &tx);
        drop(tx);
        let events: Vec<BatchEvent> = rx.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events.last(), Some(BatchEvent::Finished(s)) if s.processed == 1));
    }

    #[test]
    fn test_split_head_takes_chain_of_primary_record() {
        // `ток-шоу` (primário 49) vira `ток - шоу` no secundário, núcleo em 53.
        let mut doc = demo_document();
        doc.groups.push(CorefGroup::new("9", "5", "0", vec![49]));
        let report = process_document(&doc, &PipelineConfig::default()).unwrap();

        let show = report.mentions.iter().find(|m| m.head == 53).unwrap();
        assert_eq!(report.head_record(show).map(|r| r.offset), Some(49));

        let assignment = predicted_assignment(&report);
        let clusters = assignment.clusters_of(&show.text).unwrap();
        assert!(clusters.contains("5"));
        assert!(!clusters.iter().any(|c| c.starts_with("singleton:")));
    }

    #[test]
    fn test_negation_maps_to_primary_offset() {
        let report = process_document(&demo_document(), &PipelineConfig::default()).unwrap();
        assert_eq!(report.secondary_to_primary.get(&40), Some(&38));
        assert_eq!(report.secondary_to_primary.get(&38), None);
        assert_eq!(report.secondary_to_primary.get(&0), Some(&0));
    }

    #[test]
    fn test_evaluate_demo() {
        let report = process_document(&demo_document(), &PipelineConfig::default()).unwrap();
        let eval = evaluate_report(&report, &demo_gold_mentions(), EmptyPartnerPolicy::Skip);
        assert_eq!(eval.comparison.common, 3);
        assert_eq!(eval.comparison.symmetric_difference, vec!["брата", "не медийное ток - шоу"]);
        assert!((eval.scores.precision - 0.75).abs() < 1e-9);
        assert!((eval.scores.recall - 0.75).abs() < 1e-9);
    }
}
