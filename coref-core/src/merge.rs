//! # Fusão de Anotações
//!
//! Depois do alinhamento, cada token primário vira um [`FeatureRecord`]:
//!
//! 1. **Features linguísticas**: se o token tem par no fluxo secundário, as
//!    features do par (classe semântica, slots, paradigma) são copiadas. Sem
//!    par, o registro fica só com offset e forma de palavra.
//! 2. **Morfologia**: registros ainda sem tag são completados pelo
//!    [`MorphologyOracle`], quando há um.
//! 3. **Grupos de correferência**: cada [`CorefGroup`] anexa seus ids a todos os
//!    tokens que cobre. Um token em N grupos acumula N valores, na ordem de
//!    processamento, sem deduplicação.
//!
//! ## Qual token secundário fornece as features?
//!
//! Em casamentos 1:1 (igualdade, negação) a forma de palavra também vem do
//! secundário. Quando a fronteira difere (junção, divisão) o registro mantém a
//! forma primária e recebe as features do primeiro pedaço secundário que tem
//! análise, ou do primeiro pedaço que não é pontuação.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::align::{Alignment, MatchKind};
use crate::morphology::MorphologyOracle;
use crate::record::{FeatureRecord, TokenAnnotation};
use crate::tokenizer::is_punctuation;

/// Uma anotação de grupo: uma ocorrência de menção dentro de uma cadeia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorefGroup {
    pub group_id: String,
    pub chain_id: String,
    pub link_id: String,
    /// Offsets dos tokens primários cobertos pela menção.
    pub token_offsets: Vec<i64>,
    /// Texto da menção, quando a tabela de origem o traz.
    #[serde(default)]
    pub content: Option<String>,
}

impl CorefGroup {
    pub fn new(
        group_id: impl Into<String>,
        chain_id: impl Into<String>,
        link_id: impl Into<String>,
        token_offsets: Vec<i64>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            chain_id: chain_id.into(),
            link_id: link_id.into(),
            token_offsets,
            content: None,
        }
    }
}

/// Lê uma lista de offsets separada por vírgulas (`"12,16,20"`).
pub fn parse_offset_list(raw: &str) -> Result<Vec<i64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| format!("offset inválido `{s}`"))
        })
        .collect()
}

/// Estatísticas do acúmulo de grupos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStats {
    /// Total de pares (grupo, token) anexados.
    pub attachments: usize,
    /// Offsets citados por grupos mas inexistentes entre os registros.
    pub unknown_offsets: Vec<(String, i64)>,
}

/// Constrói um registro por token primário a partir do alinhamento.
pub fn merge_annotations(
    primary: &[TokenAnnotation],
    secondary: &[TokenAnnotation],
    alignment: &Alignment,
    oracle: Option<&dyn MorphologyOracle>,
    normalize: bool,
) -> Vec<FeatureRecord> {
    let mut records: Vec<FeatureRecord> = primary
        .iter()
        .map(|a| FeatureRecord::from_primary(a, normalize))
        .collect();

    for entry in &alignment.entries {
        let Some(range) = &entry.secondary else {
            continue;
        };
        let Some(source) = feature_source(&secondary[range.clone()]) else {
            continue;
        };
        let one_to_one = matches!(entry.kind, MatchKind::Exact | MatchKind::Negation);
        for i in entry.primary.clone() {
            let record = &mut records[i];
            let primary_form = std::mem::take(&mut record.wordform);
            record.fill_from_secondary(source, normalize);
            if !one_to_one {
                record.wordform = primary_form;
            }
        }
    }

    if let Some(oracle) = oracle {
        for record in records.iter_mut().filter(|r| r.morphology_tag.is_none()) {
            record.morphology_tag = oracle.tag(&record.wordform);
        }
    }

    records
}

fn feature_source(pieces: &[TokenAnnotation]) -> Option<&TokenAnnotation> {
    pieces
        .iter()
        .find(|p| p.has_analysis())
        .or_else(|| pieces.iter().find(|p| !is_punctuation(p.text())))
        .or_else(|| pieces.first())
}

/// Anexa os grupos de correferência aos registros, na ordem dada.
///
/// Offsets desconhecidos são reportados nas estatísticas e ignorados.
pub fn accumulate_groups(records: &mut [FeatureRecord], groups: &[CorefGroup]) -> GroupStats {
    let index: HashMap<i64, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.offset, i))
        .collect();

    let mut stats = GroupStats::default();
    for group in groups {
        for &offset in &group.token_offsets {
            match index.get(&offset) {
                Some(&i) => {
                    records[i].attach_group(&group.group_id, &group.chain_id, &group.link_id);
                    stats.attachments += 1;
                }
                None => {
                    warn!(group = %group.group_id, offset, "grupo cita offset inexistente");
                    stats.unknown_offsets.push((group.group_id.clone(), offset));
                }
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align;
    use crate::features::keys;
    use crate::morphology::PunctuationOracle;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn analysed(text: &str, offset: i64, sc: &str) -> TokenAnnotation {
        TokenAnnotation::new(text, offset)
            .with_feature(keys::SEMANTIC_CLASS, sc)
            .with_feature(keys::SYNTAX_PARADIGM, "Noun(7)")
    }

    #[test]
    fn test_parse_offset_list() {
        assert_eq!(parse_offset_list("12,16, 20").unwrap(), vec![12, 16, 20]);
        assert_eq!(parse_offset_list("7").unwrap(), vec![7]);
        assert!(parse_offset_list("7,x").is_err());
    }

    #[test]
    fn test_matched_token_receives_secondary_features() {
        let primary = vec![TokenAnnotation::new("дом", 0), TokenAnnotation::new(".", 3)];
        let secondary = vec![analysed("дом", 0, "HOUSE(10)")];
        let alignment = align(&primary, &secondary);
        let records = merge_annotations(&primary, &secondary, &alignment, Some(&PunctuationOracle), true);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].semantic_class.as_deref(), Some("HOUSE(10)"));
        assert!(!records[1].has_linguistic_features());
        assert_eq!(records[1].morphology_tag.as_deref(), Some("PNCT"));
    }

    #[test]
    fn test_split_keeps_primary_wordform() {
        let primary = vec![TokenAnnotation::new("ток-шоу", 0)];
        let secondary = vec![
            TokenAnnotation::new("ток", 0),
            TokenAnnotation::new("-", 3),
            analysed("шоу", 4, "TV_SHOW(4021)"),
        ];
        let alignment = align(&primary, &secondary);
        let records = merge_annotations(&primary, &secondary, &alignment, None, true);
        assert_eq!(records[0].wordform, "ток-шоу");
        assert_eq!(records[0].semantic_class.as_deref(), Some("TV_SHOW(4021)"));
    }

    #[test]
    fn test_joined_tokens_share_features() {
        let primary = vec![TokenAnnotation::new("так", 0), TokenAnnotation::new("что", 4)];
        let secondary = vec![analysed("так что", 0, "SO_THAT(5)")];
        let alignment = align(&primary, &secondary);
        let records = merge_annotations(&primary, &secondary, &alignment, None, true);
        assert_eq!(records[0].wordform, "так");
        assert_eq!(records[1].wordform, "что");
        assert!(records.iter().all(|r| r.semantic_class.as_deref() == Some("SO_THAT(5)")));
    }

    #[test]
    fn test_negation_copies_secondary_wordform() {
        let primary = vec![TokenAnnotation::new("немедийный", 0)];
        let secondary = vec![TokenAnnotation::new("не", 0), analysed("медийный", 2, "MEDIA(3)")];
        let alignment = align(&primary, &secondary);
        let records = merge_annotations(&primary, &secondary, &alignment, None, true);
        assert_eq!(records[0].wordform, "медийный");
        assert_eq!(records[0].offset, 0);
    }

    #[test]
    fn test_overlapping_groups_accumulate() {
        let mut records = vec![FeatureRecord::bare(0, "его"), FeatureRecord::bare(4, "брат")];
        let groups = vec![
            CorefGroup::new("1", "10", "0", vec![0]),
            CorefGroup::new("2", "11", "1", vec![0, 4]),
        ];
        let stats = accumulate_groups(&mut records, &groups);
        assert_eq!(stats.attachments, 3);
        assert_eq!(records[0].group_ids, vec!["1", "2"]);
        assert_eq!(records[0].chain_ids, vec!["10", "11"]);
        assert_eq!(records[1].group_ids, vec!["2"]);
        assert_eq!(records[1].link_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_unknown_offset_is_reported_not_fatal() {
        let mut records = vec![FeatureRecord::bare(0, "он")];
        let groups = vec![CorefGroup::new("5", "1", "0", vec![0, 99])];
        let stats = accumulate_groups(&mut records, &groups);
        assert_eq!(stats.attachments, 1);
        assert_eq!(stats.unknown_offsets, vec![("5".to_string(), 99)]);
    }

    fn group_sets(records: &[FeatureRecord]) -> Vec<(BTreeSet<String>, BTreeSet<String>)> {
        records
            .iter()
            .map(|r| {
                (
                    r.group_ids.iter().cloned().collect(),
                    r.chain_ids.iter().cloned().collect(),
                )
            })
            .collect()
    }

    fn groups_strategy() -> impl Strategy<Value = Vec<CorefGroup>> {
        prop::collection::vec((0u8..6, prop::collection::vec(0i64..8, 1..4)), 0..10).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(g, (chain, offsets))| {
                        CorefGroup::new(g.to_string(), chain.to_string(), "0", offsets)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        /// A ordem dos grupos muda a ordem dos ids, nunca o conjunto.
        #[test]
        fn group_order_does_not_change_membership(
            (groups, shuffled) in groups_strategy().prop_flat_map(|g| (Just(g.clone()), Just(g).prop_shuffle()))
        ) {
            let base: Vec<FeatureRecord> = (0..8).map(|o| FeatureRecord::bare(o, "x")).collect();

            let mut first = base.clone();
            accumulate_groups(&mut first, &groups);
            let mut second = base;
            accumulate_groups(&mut second, &shuffled);

            prop_assert_eq!(group_sets(&first), group_sets(&second));
        }
    }
}
