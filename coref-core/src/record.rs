//! # Registros Anotados
//!
//! Dois tipos de dado atravessam o pipeline:
//!
//! | Tipo                | Origem                         | Forma                                   |
//! |---------------------|--------------------------------|-----------------------------------------|
//! | [`TokenAnnotation`] | cada analisador, separadamente | token + mapa de features brutas         |
//! | [`FeatureRecord`]   | fusão dos dois fluxos          | struct fixa, um campo `Option` por tag  |
//!
//! O `FeatureRecord` é o registro canônico de um token primário. Ele só é mutado
//! durante a fusão (preenchimento de features e acúmulo de grupos); depois disso
//! é somente leitura para a árvore, as menções e a avaliação.
//!
//! ## Campos de correferência
//!
//! Um token pode pertencer a vários grupos ao mesmo tempo (menções sobrepostas).
//! `group_ids` e `chain_ids` crescem apenas por concatenação, na ordem em que os
//! grupos são processados e sem deduplicação. Um token sem grupos é impresso com
//! a sentinela (`-`) nas três colunas de correferência.

use serde::{Deserialize, Serialize};

use crate::features::{extract_id, keys, RawFeatures};
use crate::tokenizer::{normalize_wordform, Token};

/// Tag morfológica atribuída a tokens de pontuação.
pub const PUNCTUATION_TAG: &str = "PNCT";

/// Um token de um dos fluxos brutos, com suas features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAnnotation {
    pub token: Token,
    #[serde(default)]
    pub features: RawFeatures,
}

impl TokenAnnotation {
    pub fn new(text: impl Into<String>, offset: i64) -> Self {
        Self {
            token: Token::new(text, offset),
            features: RawFeatures::new(),
        }
    }

    /// Adiciona uma feature (estilo builder, útil em testes e demonstrações).
    pub fn with_feature(mut self, key: &str, value: impl Into<String>) -> Self {
        self.features.insert(key, value);
        self
    }

    pub fn text(&self) -> &str {
        &self.token.text
    }

    pub fn offset(&self) -> i64 {
        self.token.offset
    }

    /// `true` se o analisador deixou alguma feature linguística no token.
    pub fn has_analysis(&self) -> bool {
        [
            keys::SEMANTIC_CLASS,
            keys::SEMANTIC_SLOT,
            keys::SURFACE_SLOT,
            keys::SYNTAX_PARADIGM,
        ]
        .iter()
        .any(|key| self.features.get(key).is_some())
    }

    /// Offset do pai na árvore de dependências. `-1` ou ausência significam raiz,
    /// e nesse caso o próprio offset é devolvido (auto-referência).
    pub fn parent_offset(&self) -> i64 {
        match self.features.get_i64(keys::PARENT_OFFSET) {
            Some(parent) if parent >= 0 => parent,
            _ => self.offset(),
        }
    }
}

impl AsRef<Token> for TokenAnnotation {
    fn as_ref(&self) -> &Token {
        &self.token
    }
}

/// Separador de colunas na saída.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    Tab,
    Comma,
}

impl Delimiter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delimiter::Tab => "\t",
            Delimiter::Comma => ",",
        }
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Delimiter::Tab
    }
}

/// Registro canônico de um token, resultado da fusão dos dois fluxos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Posição do token no texto compartilhado (chave única no documento).
    pub offset: i64,
    pub wordform: String,
    pub morphology_tag: Option<String>,
    /// Classe semântica (`SC`).
    pub semantic_class: Option<String>,
    /// Papel semântico (`SemSlot`).
    pub semantic_slot: Option<String>,
    /// Posição sintática de superfície (`SurfSlot`).
    pub syntax_slot: Option<String>,
    /// Paradigma sintático (`SP`), usado para achar núcleos nominais.
    pub syntax_paradigm: Option<String>,
    pub group_ids: Vec<String>,
    pub chain_ids: Vec<String>,
    /// Link do primeiro grupo que mencionou o token.
    pub link_id: Option<String>,
}

impl FeatureRecord {
    /// Registro "nu": apenas offset e forma, nenhuma feature linguística.
    pub fn bare(offset: i64, wordform: impl Into<String>) -> Self {
        Self {
            offset,
            wordform: wordform.into(),
            morphology_tag: None,
            semantic_class: None,
            semantic_slot: None,
            syntax_slot: None,
            syntax_paradigm: None,
            group_ids: Vec::new(),
            chain_ids: Vec::new(),
            link_id: None,
        }
    }

    /// Registro a partir de um token primário. Só a morfologia vem junto, quando
    /// o fluxo primário já a traz calculada (coluna `gram`).
    pub fn from_primary(annotation: &TokenAnnotation, normalize: bool) -> Self {
        let wordform = if normalize {
            normalize_wordform(annotation.text())
        } else {
            annotation.text().to_string()
        };
        let mut record = Self::bare(annotation.offset(), wordform);
        record.morphology_tag = annotation.features.get(keys::MORPHOLOGY).map(str::to_string);
        record
    }

    /// Registro a partir de um token do fluxo secundário, com todas as suas
    /// features. É o que a extração de menções consulta por id de nó.
    pub fn from_secondary(annotation: &TokenAnnotation, normalize: bool) -> Self {
        let mut record = Self::bare(annotation.offset(), annotation.text());
        record.fill_from_secondary(annotation, normalize);
        record
    }

    /// Copia as features linguísticas de um token secundário casado.
    ///
    /// A forma de palavra passa a ser a do fluxo secundário. Se o secundário
    /// trouxer morfologia, ela substitui a do primário.
    pub fn fill_from_secondary(&mut self, secondary: &TokenAnnotation, normalize: bool) {
        let features = &secondary.features;
        let text = features.get(keys::TEXT).unwrap_or(secondary.text());
        self.wordform = if normalize {
            normalize_wordform(text)
        } else {
            text.to_string()
        };
        if let Some(morph) = features.get(keys::MORPHOLOGY) {
            self.morphology_tag = Some(morph.to_string());
        }
        self.semantic_class = features.get(keys::SEMANTIC_CLASS).map(str::to_string);
        self.semantic_slot = features.get(keys::SEMANTIC_SLOT).map(str::to_string);
        self.syntax_slot = features.get(keys::SURFACE_SLOT).map(str::to_string);
        self.syntax_paradigm = features.get(keys::SYNTAX_PARADIGM).map(str::to_string);
    }

    /// `true` se alguma feature vinda do analisador secundário está presente.
    pub fn has_linguistic_features(&self) -> bool {
        self.semantic_class.is_some()
            || self.semantic_slot.is_some()
            || self.syntax_slot.is_some()
            || self.syntax_paradigm.is_some()
    }

    /// `true` quando o token pertence a pelo menos um grupo de correferência.
    pub fn is_mentioned(&self) -> bool {
        !self.group_ids.is_empty()
    }

    pub fn is_punctuation(&self) -> bool {
        self.morphology_tag.as_deref() == Some(PUNCTUATION_TAG)
    }

    /// Anexa a participação num grupo. Nunca remove nem deduplica.
    pub fn attach_group(&mut self, group_id: &str, chain_id: &str, link_id: &str) {
        if self.link_id.is_none() {
            self.link_id = Some(link_id.to_string());
        }
        self.group_ids.push(group_id.to_string());
        self.chain_ids.push(chain_id.to_string());
    }

    /// Valores da coluna de link.
    ///
    /// O primeiro grupo contribui com seu link; cada grupo seguinte contribui com
    /// o id da sua cadeia. Assim um token em N grupos tem N valores em cada uma
    /// das três colunas de correferência.
    pub fn link_column(&self) -> Vec<String> {
        let Some(link) = &self.link_id else {
            return Vec::new();
        };
        std::iter::once(link.clone())
            .chain(self.chain_ids.iter().skip(1).cloned())
            .collect()
    }

    /// Linha de saída com os campos na ordem canônica.
    ///
    /// `offset, wordform, morphology, semantic_class, semantic_slot, syntax_slot,
    /// syntax_paradigm, group_ids, chain_ids, link`
    pub fn render(&self, delimiter: Delimiter, sentinel: &str) -> String {
        let optional = |v: &Option<String>| v.clone().unwrap_or_else(|| sentinel.to_string());
        let joined = |v: &[String]| {
            if v.is_empty() {
                sentinel.to_string()
            } else {
                v.join(",")
            }
        };
        [
            self.offset.to_string(),
            self.wordform.clone(),
            optional(&self.morphology_tag),
            optional(&self.semantic_class),
            optional(&self.semantic_slot),
            optional(&self.syntax_slot),
            optional(&self.syntax_paradigm),
            joined(&self.group_ids),
            joined(&self.chain_ids),
            joined(&self.link_column()),
        ]
        .join(delimiter.as_str())
    }

    /// Linha do dataset para o classificador a jusante.
    ///
    /// Só tokens que não são pontuação e que têm classe semântica entram.
    /// Ids ausentes viram `"0"`; campos de correferência ausentes, a sentinela.
    pub fn dataset_row(&self, sentinel: &str) -> Option<String> {
        if self.is_punctuation() {
            return None;
        }
        let semantic_class = self.semantic_class.as_deref()?;
        let id_of = |v: Option<&str>| v.and_then(extract_id).unwrap_or("0").to_string();
        let joined = |v: &[String]| {
            if v.is_empty() {
                sentinel.to_string()
            } else {
                v.join(",")
            }
        };
        let fields = [
            id_of(Some(semantic_class)),
            id_of(self.semantic_slot.as_deref()),
            id_of(self.syntax_slot.as_deref()),
            id_of(self.syntax_paradigm.as_deref()),
            self.morphology_tag.clone().unwrap_or_else(|| sentinel.to_string()),
            joined(&self.group_ids),
            joined(&self.chain_ids),
            joined(&self.link_column()),
        ];
        Some(fields.join(","))
    }
}

/// Ordena registros por offset (ordem de saída).
pub fn sort_by_offset(records: &mut [FeatureRecord]) {
    records.sort_by_key(|r| r.offset);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secondary() -> TokenAnnotation {
        TokenAnnotation::new("шоу", 4)
            .with_feature(keys::SEMANTIC_CLASS, "TV_SHOW(4021)")
            .with_feature(keys::SURFACE_SLOT, "$Object(88)")
            .with_feature(keys::SYNTAX_PARADIGM, "Noun(7)")
    }

    #[test]
    fn test_bare_record_renders_sentinels() {
        let record = FeatureRecord::bare(10, "и");
        assert_eq!(record.render(Delimiter::Tab, "-"), "10\tи\t-\t-\t-\t-\t-\t-\t-\t-");
        assert!(!record.is_mentioned());
        assert!(!record.has_linguistic_features());
    }

    #[test]
    fn test_fill_from_secondary() {
        let mut record = FeatureRecord::bare(4, "шоу");
        record.fill_from_secondary(&secondary(), true);
        assert!(record.has_linguistic_features());
        assert_eq!(record.syntax_paradigm.as_deref(), Some("Noun(7)"));
        assert_eq!(record.semantic_slot, None);
    }

    #[test]
    fn test_groups_accumulate_in_all_three_columns() {
        let mut record = FeatureRecord::bare(0, "он");
        record.attach_group("g1", "c1", "l1");
        record.attach_group("g2", "c2", "l2");
        assert_eq!(record.group_ids, vec!["g1", "g2"]);
        assert_eq!(record.chain_ids, vec!["c1", "c2"]);
        assert_eq!(record.link_column(), vec!["l1", "c2"]);
        let line = record.render(Delimiter::Comma, "-");
        assert!(line.ends_with("g1,g2,c1,c2,l1,c2"));
    }

    #[test]
    fn test_dataset_row_uses_numeric_ids() {
        let mut record = FeatureRecord::bare(4, "шоу");
        record.fill_from_secondary(&secondary(), false);
        record.morphology_tag = Some("NOUN".to_string());
        record.attach_group("7", "3", "0");
        assert_eq!(record.dataset_row("-").as_deref(), Some("4021,0,88,7,NOUN,7,3,0"));
    }

    #[test]
    fn test_dataset_row_skips_punctuation_and_unanalysed() {
        let mut punct = FeatureRecord::bare(3, ",");
        punct.morphology_tag = Some(PUNCTUATION_TAG.to_string());
        punct.semantic_class = Some("X(1)".to_string());
        assert_eq!(punct.dataset_row("-"), None);
        assert_eq!(FeatureRecord::bare(0, "и").dataset_row("-"), None);
    }

    #[test]
    fn test_parent_offset_minus_one_is_root() {
        let root = TokenAnnotation::new("читал", 5).with_feature(keys::PARENT_OFFSET, "-1");
        assert_eq!(root.parent_offset(), 5);
        let child = TokenAnnotation::new("книгу", 11).with_feature(keys::PARENT_OFFSET, "5");
        assert_eq!(child.parent_offset(), 5);
    }
}
