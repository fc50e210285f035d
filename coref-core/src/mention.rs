//! # Extração de Menções
//!
//! Uma menção candidata é uma subárvore cujo núcleo é nominal: o paradigma
//! sintático do núcleo contém o paradigma configurado (`Noun(7)` por padrão).
//!
//! ```text
//!            читал(5)                 RootChildren:
//!           /        \                  "Мальчик"
//!    Мальчик(0)    книгу(11)            "книгу брата"
//!                      |
//!                  брата(17)          Recursive: as duas acima + "брата"
//! ```
//!
//! Os ids de uma subárvore são ordenados (ordem dos ids = ordem no texto) e o
//! texto da menção é a junção das formas de palavra com um espaço.
//!
//! ## Políticas
//!
//! - [`MentionPolicy::RootChildren`]: só filhos diretos de cada raiz são núcleos
//!   candidatos. Sintagmas nominais aninhados não geram menções próprias.
//! - [`MentionPolicy::Recursive`]: todo nó não-raiz com núcleo nominal gera uma
//!   menção, inclusive os aninhados.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::record::FeatureRecord;
use crate::tree::{DependencyForest, TreeNode};

/// Quais nós da floresta podem ser núcleo de menção.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionPolicy {
    RootChildren,
    Recursive,
}

impl Default for MentionPolicy {
    fn default() -> Self {
        MentionPolicy::RootChildren
    }
}

/// Uma menção extraída.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Id (offset) do núcleo.
    pub head: i64,
    /// Ids da subárvore, em ordem crescente.
    pub token_ids: Vec<i64>,
    pub text: String,
}

/// Índice `offset → registro` consultado durante a extração.
pub type RecordIndex<'a> = HashMap<i64, &'a FeatureRecord>;

pub fn index_records(records: &[FeatureRecord]) -> RecordIndex<'_> {
    records.iter().map(|r| (r.offset, r)).collect()
}

/// Extrator de menções configurado com o paradigma nominal e a política.
#[derive(Debug, Clone)]
pub struct MentionExtractor {
    noun_paradigm: String,
    policy: MentionPolicy,
}

impl MentionExtractor {
    pub fn new(noun_paradigm: impl Into<String>, policy: MentionPolicy) -> Self {
        Self {
            noun_paradigm: noun_paradigm.into(),
            policy,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.noun_paradigm.clone(), config.mention_policy)
    }

    /// Extrai as menções de todas as árvores da floresta.
    ///
    /// Um id da floresta sem registro no índice é erro ([`Error::MissingToken`]):
    /// a árvore e os registros vieram do mesmo fluxo e deveriam cobrir os
    /// mesmos tokens.
    pub fn extract(&self, forest: &DependencyForest, records: &RecordIndex<'_>) -> Result<Vec<Mention>> {
        let mut mentions = Vec::new();
        for root in forest.roots() {
            let candidates: Vec<&TreeNode> = match self.policy {
                MentionPolicy::RootChildren => forest.children(root).collect(),
                MentionPolicy::Recursive => forest.descendants(root),
            };
            for node in candidates {
                if self.is_noun_head(node.id, records)? {
                    mentions.push(self.build_mention(forest, node.id, records)?);
                }
            }
        }
        Ok(mentions)
    }

    fn is_noun_head(&self, id: i64, records: &RecordIndex<'_>) -> Result<bool> {
        let record = records.get(&id).ok_or(Error::MissingToken { id })?;
        Ok(record
            .syntax_paradigm
            .as_deref()
            .is_some_and(|sp| sp.contains(self.noun_paradigm.as_str())))
    }

    fn build_mention(&self, forest: &DependencyForest, head: i64, records: &RecordIndex<'_>) -> Result<Mention> {
        let token_ids = forest.subtree_ids(head);
        let words = token_ids
            .iter()
            .map(|id| {
                records
                    .get(id)
                    .map(|r| r.wordform.as_str())
                    .ok_or(Error::MissingToken { id: *id })
            })
            .collect::<Result<Vec<&str>>>()?;
        Ok(Mention {
            head,
            text: words.join(" "),
            token_ids,
        })
    }
}

/// Resultado da comparação entre menções extraídas e menções de referência.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionComparison {
    /// Menções extraídas distintas.
    pub extracted: usize,
    /// Menções de referência distintas.
    pub gold: usize,
    /// Presentes nos dois conjuntos.
    pub common: usize,
    /// Presentes em apenas um dos conjuntos, em ordem alfabética.
    pub symmetric_difference: Vec<String>,
}

/// Compara dois conjuntos de textos de menção (duplicatas são descartadas).
pub fn compare_mentions<E, G>(extracted: E, gold: G) -> MentionComparison
where
    E: IntoIterator,
    E::Item: AsRef<str>,
    G: IntoIterator,
    G::Item: AsRef<str>,
{
    let extracted: BTreeSet<String> = extracted.into_iter().map(|m| m.as_ref().to_string()).collect();
    let gold: BTreeSet<String> = gold.into_iter().map(|m| m.as_ref().to_string()).collect();
    MentionComparison {
        extracted: extracted.len(),
        gold: gold.len(),
        common: extracted.intersection(&gold).count(),
        symmetric_difference: extracted.symmetric_difference(&gold).cloned().collect(),
    }
}
