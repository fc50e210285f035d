//! # Oráculo Morfológico
//!
//! O pipeline não faz análise morfológica. Ele apenas define o contrato que um
//! analisador externo precisa cumprir: dada uma forma de palavra, devolver uma
//! tag (ou nada). Durante a fusão, registros sem morfologia são completados
//! pelo oráculo configurado.
//!
//! Duas implementações acompanham o crate:
//! - [`PunctuationOracle`]: marca pontuação como `PNCT` e nada mais.
//! - [`LexiconOracle`]: dicionário em memória `forma → tag`, com fallback para
//!   pontuação. Pode ser carregado de um arquivo `forma<TAB>tag`.

use std::collections::HashMap;

use crate::error::RowWarning;
use crate::record::PUNCTUATION_TAG;
use crate::tokenizer::is_punctuation;

/// Contrato de um analisador morfológico externo.
pub trait MorphologyOracle: Send + Sync {
    /// Tag morfológica para a forma de palavra, se conhecida.
    fn tag(&self, wordform: &str) -> Option<String>;
}

/// Só reconhece pontuação.
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationOracle;

impl MorphologyOracle for PunctuationOracle {
    fn tag(&self, wordform: &str) -> Option<String> {
        is_punctuation(wordform).then(|| PUNCTUATION_TAG.to_string())
    }
}

/// Dicionário de formas de palavra. A busca ignora maiúsculas.
#[derive(Debug, Clone, Default)]
pub struct LexiconOracle {
    entries: HashMap<String, String>,
}

impl LexiconOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, wordform: &str, tag: impl Into<String>) {
        self.entries.insert(wordform.to_lowercase(), tag.into());
    }

    /// Lê linhas `forma<TAB>tag`. Linhas vazias são puladas; linhas sem tab
    /// viram avisos.
    pub fn from_tsv(raw: &str) -> (Self, Vec<RowWarning>) {
        let mut oracle = Self::new();
        let mut warnings = Vec::new();
        for (i, line) in raw.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((form, tag)) if !form.is_empty() && !tag.is_empty() => {
                    oracle.insert(form, tag)
                }
                _ => warnings.push(RowWarning::new(i + 1, "esperado `forma<TAB>tag`")),
            }
        }
        (oracle, warnings)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MorphologyOracle for LexiconOracle {
    fn tag(&self, wordform: &str) -> Option<String> {
        self.entries
            .get(&wordform.to_lowercase())
            .cloned()
            .or_else(|| PunctuationOracle.tag(wordform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation_oracle() {
        assert_eq!(PunctuationOracle.tag(",").as_deref(), Some("PNCT"));
        assert_eq!(PunctuationOracle.tag("дом"), None);
    }

    #[test]
    fn test_lexicon_lookup_is_case_insensitive() {
        let mut oracle = LexiconOracle::new();
        oracle.insert("Дом", "NOUN,inan,masc sing,nomn");
        assert_eq!(oracle.tag("дом").as_deref(), Some("NOUN,inan,masc sing,nomn"));
        assert_eq!(oracle.tag("."), Some("PNCT".to_string()));
        assert_eq!(oracle.tag("кот"), None);
    }

    #[test]
    fn test_lexicon_from_tsv_reports_bad_lines() {
        let raw = "дом\tNOUN\n\nсломанная линия\nбыл\tVERB\n";
        let (oracle, warnings) = LexiconOracle::from_tsv(raw);
        assert_eq!(oracle.len(), 2);
        assert_eq!(warnings, vec![RowWarning::new(3, "esperado `forma<TAB>tag`")]);
    }
}
