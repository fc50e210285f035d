//! # coref-core — Fusão de Anotações e Avaliação de Correferência
//!
//! Este crate reconcilia duas anotações independentes do mesmo texto russo (o
//! corpus RuCor e a saída de um analisador sintático-semântico), funde as
//! features de cada token num registro canônico, extrai menções nominais da
//! árvore de dependências e avalia cadeias de correferência com BCubed estendido.
//!
//! ## Arquitetura do Sistema
//!
//! 1.  **Entrada**: dois fluxos de tokens com offsets ([`corpus`]) e a tabela de
//!     grupos de correferência.
//! 2.  **Alinhamento** ([`align`]): casa tokens cujas fronteiras divergem
//!     (junções, divisões, prefixo de negação, pontuação descartada).
//! 3.  **Fusão** ([`merge`]): um [`FeatureRecord`] por token primário, com
//!     features, morfologia ([`morphology`]) e ids de grupo/cadeia acumulados.
//! 4.  **Floresta** ([`tree`]): árvore de dependências em arena.
//! 5.  **Menções** ([`mention`]): subárvores com núcleo nominal.
//! 6.  **Avaliação** ([`bcubed`]): precisão e revocação com pertencimento múltiplo.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use coref_core::{corpus, process_document, PipelineConfig};
//!
//! // 1. Documento de demonstração (RuCor + analisador)
//! let doc = corpus::demo_document();
//!
//! // 2. Alinha, funde, monta a floresta e extrai menções
//! let config = PipelineConfig::default();
//! let report = process_document(&doc, &config).unwrap();
//!
//! // 3. Registros na ordem canônica de campos
//! for line in report.render_records(&config) {
//!     println!("{line}");
//! }
//! assert!(report.mention_texts().contains(&"книгу брата"));
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: orquestrador, eventos de streaming e processamento em lote.
//! - [`align`]: alinhamento entre tokenizações.
//! - [`bcubed`]: métrica de avaliação de clusters.
//! - [`config`]: parâmetros do pipeline.

pub mod align;
pub mod bcubed;
pub mod config;
pub mod corpus;
pub mod error;
pub mod features;
pub mod mention;
pub mod merge;
pub mod morphology;
pub mod pipeline;
pub mod record;
pub mod tokenizer;
pub mod tree;

pub use align::{align, Aligner, Alignment, AlignmentEntry, MatchKind};
pub use bcubed::{BCubed, BCubedScores, ClusterAssignment, EmptyPartnerPolicy};
pub use config::PipelineConfig;
pub use error::{Error, Result, RowWarning};
pub use mention::{compare_mentions, Mention, MentionComparison, MentionExtractor, MentionPolicy};
pub use merge::CorefGroup;
pub use morphology::{LexiconOracle, MorphologyOracle, PunctuationOracle};
pub use pipeline::{
    evaluate_report, process_document, run_batch, BatchEvent, BatchReport, BatchSummary, CorefPipeline,
    Document, DocumentOutcome, DocumentReport, LogProgress, PipelineEvent, Progress, ProgressSink,
};
pub use record::{Delimiter, FeatureRecord, TokenAnnotation};
pub use tokenizer::{Token, TokenizerMode};
pub use tree::{DependencyForest, TreeNode};
