//! # Configuração do Pipeline
//!
//! Todos os parâmetros ajustáveis do processamento ficam em [`PipelineConfig`].
//! A configuração é lida de JSON e cada campo tem um valor padrão, então um
//! objeto vazio (`{}`) já é uma configuração válida.
//!
//! ## Exemplo
//!
//! ```rust
//! use coref_core::config::PipelineConfig;
//! use coref_core::mention::MentionPolicy;
//!
//! let config = PipelineConfig::from_json_str(r#"{ "mention_policy": "recursive" }"#).unwrap();
//! assert_eq!(config.mention_policy, MentionPolicy::Recursive);
//! assert_eq!(config.noun_paradigm, "Noun(7)");
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bcubed::EmptyPartnerPolicy;
use crate::error::{Error, Result};
use crate::mention::MentionPolicy;
use crate::record::Delimiter;

/// Parâmetros do pipeline de alinhamento, fusão, extração e avaliação.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Paradigma sintático que marca o núcleo de um sintagma nominal.
    /// Um token é núcleo quando seu paradigma *contém* este valor.
    pub noun_paradigm: String,
    /// Quais subárvores viram candidatas a menção.
    pub mention_policy: MentionPolicy,
    /// O que fazer com elementos sem parceiros na média interna do BCubed.
    pub empty_partner_policy: EmptyPartnerPolicy,
    /// Valor impresso no lugar de campos ausentes.
    pub sentinel: String,
    /// Separador de colunas na saída dos registros.
    pub delimiter: Delimiter,
    /// Número máximo de pedaços que um token pode ter no outro fluxo
    /// (ex: "ток-шоу" → "ток", "-", "шоу" usa 3).
    pub max_split_pieces: usize,
    /// Prefixo de negação que um dos analisadores separa da palavra.
    pub negation_prefix: String,
    /// Aplica normalização NFC às formas de palavra antes de comparar.
    pub normalize_unicode: bool,
    /// Descarta pontuação que só o fluxo secundário tem (ex: `«`) em vez de
    /// deixar o token primário corrente sem par.
    pub skip_secondary_punctuation: bool,
    /// Descarta um token secundário cujo offset ficou atrás do primário
    /// corrente, quando nenhuma outra regra casou.
    pub resync_by_offset: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            noun_paradigm: "Noun(7)".to_string(),
            mention_policy: MentionPolicy::default(),
            empty_partner_policy: EmptyPartnerPolicy::default(),
            sentinel: "-".to_string(),
            delimiter: Delimiter::default(),
            max_split_pieces: 3,
            negation_prefix: "не".to_string(),
            normalize_unicode: true,
            skip_secondary_punctuation: false,
            resync_by_offset: false,
        }
    }
}

impl PipelineConfig {
    /// Lê a configuração de uma string JSON e valida o resultado.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Lê a configuração de um arquivo JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Verifica valores que tornariam o pipeline sem sentido.
    pub fn validate(&self) -> Result<()> {
        if self.max_split_pieces < 2 {
            return Err(Error::config(format!(
                "max_split_pieces deve ser >= 2 (recebido {})",
                self.max_split_pieces
            )));
        }
        if self.noun_paradigm.trim().is_empty() {
            return Err(Error::config("noun_paradigm não pode ser vazio"));
        }
        if self.sentinel.is_empty() {
            return Err(Error::config("sentinel não pode ser vazio"));
        }
        Ok(())
    }
}
