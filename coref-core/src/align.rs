//! # Alinhamento entre Tokenizações
//!
//! Os dois analisadores discordam sobre onde os tokens começam e terminam. Este
//! módulo casa cada token do fluxo **primário** (`A`) com zero ou mais tokens do
//! fluxo **secundário** (`B`).
//!
//! ## Algoritmo
//!
//! Varredura com dois ponteiros `(i, j)`, em tempo linear amortizado. A cada passo
//! as regras abaixo são tentadas nesta ordem, e a primeira que se aplica decide:
//!
//! | # | Regra                    | Exemplo                              | Avanço          |
//! |---|--------------------------|--------------------------------------|-----------------|
//! | 1 | Igualdade de texto       | `дом` ↔ `дом`                        | `i+1`, `j+1`    |
//! | 2 | `A[i]` é pontuação       | `,` sem par                          | `i+1`           |
//! | 3 | `B[j]` é pontuação (*)   | `B` tem `«`, `A` não                 | `j+1`           |
//! | 4 | Prefixo de negação       | `немедийный` ↔ `не` + `медийный`     | `i+1`, `j+2`    |
//! | 5 | `A` mais curto: junção   | `так` + `что` ↔ `так что`            | `i+k`, `j+1`    |
//! | 6 | `A` mais longo: divisão  | `ток-шоу` ↔ `ток` + `-` + `шоу`      | `i+1`, `j+k`    |
//! | 7 | `B` atrasado (*)         | `B[j].offset < A[i].offset`          | `j+1`           |
//! | 8 | Sem par                  | —                                    | `i+1`           |
//!
//! As regras marcadas com (*) só valem quando ligadas na configuração
//! (`skip_secondary_punctuation`, `resync_by_offset`). Desligadas, o token
//! primário corrente fica sem par e só `i` avança. A regra 7 pode descartar um
//! `B[j]` que o próximo `A` casaria.
//!
//! As junções e divisões comparam o texto sem espaços e aceitam até
//! `max_split_pieces` pedaços. A regra de negação vem antes da divisão genérica:
//! `не` + `медийный` também reconstrói `немедийный`, mas o par semântico de
//! `немедийный` é `медийный`.
//!
//! ## Garantias
//!
//! - Todo elemento de `A` aparece em exatamente uma entrada, casado ou não.
//! - Elementos de `B` sem par são descartados (e listados em `dropped_secondary`).
//! - Falhar em casar um token nunca é erro: o registro só fica sem features.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::PipelineConfig;
use crate::tokenizer::{comparison_key, is_punctuation, normalize_wordform, strip_graphemes, Token};

/// Qual regra produziu uma entrada do alinhamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    /// Vários tokens primários formam um único token secundário.
    Joined,
    /// Um token primário foi quebrado em vários tokens secundários.
    Split,
    /// O secundário separou o prefixo de negação; casa com o resto da palavra.
    Negation,
    /// Pontuação primária sem par.
    Punctuation,
    Unmatched,
}

/// Uma entrada: um intervalo de índices primários e, se houver, o intervalo
/// secundário correspondente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentEntry {
    pub primary: Range<usize>,
    pub secondary: Option<Range<usize>>,
    pub kind: MatchKind,
}

impl AlignmentEntry {
    fn matched(primary: Range<usize>, secondary: Range<usize>, kind: MatchKind) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
            kind,
        }
    }

    fn unmatched(i: usize, kind: MatchKind) -> Self {
        Self {
            primary: i..i + 1,
            secondary: None,
            kind,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.secondary.is_some()
    }
}

/// Resultado do alinhamento de dois fluxos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    /// Entradas em ordem crescente de índice primário, cobrindo todo `A`.
    pub entries: Vec<AlignmentEntry>,
    /// Índices secundários descartados sem par.
    pub dropped_secondary: Vec<usize>,
}

impl Alignment {
    /// Pares `(índice primário, intervalo secundário)` para todos os tokens
    /// primários casados. Numa junção, cada token primário aparece com o mesmo
    /// intervalo secundário.
    pub fn matched_pairs(&self) -> impl Iterator<Item = (usize, Range<usize>)> + '_ {
        self.entries.iter().flat_map(|entry| {
            let secondary = entry.secondary.clone();
            entry
                .primary
                .clone()
                .filter_map(move |i| secondary.clone().map(|s| (i, s)))
        })
    }

    /// Índice secundário → índice primário. Todo pedaço de uma divisão aponta
    /// para o mesmo token primário; numa junção vale o primeiro token primário.
    pub fn secondary_to_primary(&self) -> BTreeMap<usize, usize> {
        let mut map = BTreeMap::new();
        for (i, range) in self.matched_pairs() {
            for j in range {
                map.entry(j).or_insert(i);
            }
        }
        map
    }

    /// Número de entradas produzidas por uma regra.
    pub fn count(&self, kind: MatchKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Número de tokens primários sem par (pontuação incluída).
    pub fn unmatched_primary(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.is_matched())
            .map(|e| e.primary.len())
            .sum()
    }
}

/// Motor de alinhamento, parametrizado pela configuração do pipeline.
#[derive(Debug, Clone)]
pub struct Aligner {
    max_pieces: usize,
    negation_prefix: String,
    negation_len: usize,
    normalize: bool,
    skip_secondary_punctuation: bool,
    resync_by_offset: bool,
}

impl Default for Aligner {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl Aligner {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let negation_prefix = config.negation_prefix.to_lowercase();
        Self {
            max_pieces: config.max_split_pieces.max(2),
            negation_len: negation_prefix.graphemes(true).count(),
            negation_prefix,
            normalize: config.normalize_unicode,
            skip_secondary_punctuation: config.skip_secondary_punctuation,
            resync_by_offset: config.resync_by_offset,
        }
    }

    fn text_of(&self, token: &Token) -> String {
        if self.normalize {
            normalize_wordform(&token.text)
        } else {
            token.text.clone()
        }
    }

    /// Alinha o fluxo primário ao secundário. Ambos devem estar em ordem
    /// crescente de offset.
    pub fn align<A, B>(&self, primary: &[A], secondary: &[B]) -> Alignment
    where
        A: AsRef<Token>,
        B: AsRef<Token>,
    {
        let a: Vec<String> = primary.iter().map(|t| self.text_of(t.as_ref())).collect();
        let b: Vec<String> = secondary.iter().map(|t| self.text_of(t.as_ref())).collect();

        let mut alignment = Alignment::default();
        let (mut i, mut j) = (0usize, 0usize);

        while i < a.len() {
            if j >= b.len() {
                debug!(token = %a[i], offset = primary[i].as_ref().offset, "fluxo secundário esgotado");
                alignment.entries.push(AlignmentEntry::unmatched(i, MatchKind::Unmatched));
                i += 1;
                continue;
            }

            let a_key = comparison_key(&a[i]);
            let b_key = comparison_key(&b[j]);

            // 1. igualdade
            if a_key == b_key {
                alignment
                    .entries
                    .push(AlignmentEntry::matched(i..i + 1, j..j + 1, MatchKind::Exact));
                i += 1;
                j += 1;
                continue;
            }

            // 2-3. pontuação que só um dos lados tem
            if is_punctuation(&a[i]) {
                alignment.entries.push(AlignmentEntry::unmatched(i, MatchKind::Punctuation));
                i += 1;
                continue;
            }
            if self.skip_secondary_punctuation && is_punctuation(&b[j]) {
                alignment.dropped_secondary.push(j);
                j += 1;
                continue;
            }

            // 4. prefixo de negação separado
            if self.is_negation_split(&a[i], &b, j) {
                alignment.dropped_secondary.push(j);
                alignment
                    .entries
                    .push(AlignmentEntry::matched(i..i + 1, j + 1..j + 2, MatchKind::Negation));
                i += 1;
                j += 2;
                continue;
            }

            // 5-6. diferenças de fronteira
            let (a_len, b_len) = (a_key.chars().count(), b_key.chars().count());
            if a_len < b_len {
                if let Some(end) = self.concat_until(&a, i, &b_key) {
                    alignment
                        .entries
                        .push(AlignmentEntry::matched(i..end, j..j + 1, MatchKind::Joined));
                    i = end;
                    j += 1;
                    continue;
                }
            } else if a_len > b_len {
                if let Some(end) = self.concat_until(&b, j, &a_key) {
                    alignment
                        .entries
                        .push(AlignmentEntry::matched(i..i + 1, j..end, MatchKind::Split));
                    i += 1;
                    j = end;
                    continue;
                }
            }

            // 7. secundário ficou para trás: descarta e tenta de novo
            if self.resync_by_offset && secondary[j].as_ref().offset < primary[i].as_ref().offset {
                alignment.dropped_secondary.push(j);
                j += 1;
                continue;
            }

            // 8. sem par
            debug!(token = %a[i], offset = primary[i].as_ref().offset, "token primário sem par");
            alignment.entries.push(AlignmentEntry::unmatched(i, MatchKind::Unmatched));
            i += 1;
        }

        alignment.dropped_secondary.extend(j..b.len());
        alignment
    }

    fn is_negation_split(&self, word: &str, b: &[String], j: usize) -> bool {
        if b[j].to_lowercase() != self.negation_prefix || j + 1 >= b.len() {
            return false;
        }
        let rest = strip_graphemes(word, self.negation_len);
        !rest.is_empty() && b[j + 1] == rest
    }

    /// Concatena `pieces[start..]` até reconstruir `target`. Devolve o fim
    /// (exclusivo) do intervalo usado, com pelo menos dois pedaços.
    fn concat_until(&self, pieces: &[String], start: usize, target: &str) -> Option<usize> {
        let mut acc = comparison_key(&pieces[start]);
        if acc.is_empty() || !target.starts_with(&acc) {
            return None;
        }
        let limit = (start + self.max_pieces).min(pieces.len());
        for k in start + 1..limit {
            acc.push_str(&comparison_key(&pieces[k]));
            if acc == target {
                return Some(k + 1);
            }
            if !target.starts_with(&acc) {
                break;
            }
        }
        None
    }
}

/// Alinha com a configuração padrão.
pub fn align<A: AsRef<Token>, B: AsRef<Token>>(primary: &[A], secondary: &[B]) -> Alignment {
    Aligner::default().align(primary, secondary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stream(words: &[(&str, i64)]) -> Vec<Token> {
        words.iter().map(|(t, o)| Token::new(*t, *o)).collect()
    }

    #[test]
    fn test_identical_streams() {
        let a = stream(&[("Мама", 0), ("мыла", 5), ("раму", 10)]);
        let alignment = align(&a, &a);
        assert_eq!(alignment.count(MatchKind::Exact), 3);
        assert!(alignment.dropped_secondary.is_empty());
    }

    #[test]
    fn test_hyphen_compound_two_pieces() {
        let a = stream(&[("ток-шоу", 0)]);
        let b = stream(&[("ток-", 0), ("шоу", 4)]);
        let alignment = align(&a, &b);
        assert_eq!(alignment.entries, vec![AlignmentEntry::matched(0..1, 0..2, MatchKind::Split)]);
    }

    #[test]
    fn test_hyphen_compound_three_pieces() {
        let a = stream(&[("ток-шоу", 0), ("идёт", 8)]);
        let b = stream(&[("ток", 0), ("-", 3), ("шоу", 4), ("идёт", 8)]);
        let alignment = align(&a, &b);
        assert_eq!(alignment.entries[0], AlignmentEntry::matched(0..1, 0..3, MatchKind::Split));
        assert_eq!(alignment.entries[1], AlignmentEntry::matched(1..2, 3..4, MatchKind::Exact));
    }

    #[test]
    fn test_negation_prefix() {
        let a = stream(&[("немедийный", 0)]);
        let b = stream(&[("не", 0), ("медийный", 2)]);
        let alignment = align(&a, &b);
        assert_eq!(
            alignment.entries,
            vec![AlignmentEntry::matched(0..1, 1..2, MatchKind::Negation)]
        );
        assert_eq!(alignment.dropped_secondary, vec![0]);
    }

    #[test]
    fn test_standalone_negation_matches_exactly() {
        let a = stream(&[("не", 0), ("знаю", 3)]);
        let b = stream(&[("не", 0), ("знаю", 3)]);
        assert_eq!(align(&a, &b).count(MatchKind::Exact), 2);
    }

    #[test]
    fn test_space_joined_token() {
        let a = stream(&[("так", 0), ("что", 4)]);
        let b = stream(&[("так что", 0)]);
        let alignment = align(&a, &b);
        assert_eq!(alignment.entries, vec![AlignmentEntry::matched(0..2, 0..1, MatchKind::Joined)]);
        let pairs: Vec<_> = alignment.matched_pairs().collect();
        assert_eq!(pairs, vec![(0, 0..1), (1, 0..1)]);
    }

    #[test]
    fn test_primary_punctuation_left_unmatched() {
        let a = stream(&[("да", 0), (",", 2), ("нет", 4)]);
        let b = stream(&[("да", 0), ("нет", 4)]);
        let alignment = align(&a, &b);
        assert_eq!(alignment.entries[1], AlignmentEntry::unmatched(1, MatchKind::Punctuation));
        assert_eq!(alignment.entries[2], AlignmentEntry::matched(2..3, 1..2, MatchKind::Exact));
    }

    fn lenient() -> Aligner {
        Aligner::from_config(&PipelineConfig {
            skip_secondary_punctuation: true,
            resync_by_offset: true,
            ..PipelineConfig::default()
        })
    }

    #[test]
    fn test_secondary_punctuation_kept_by_default() {
        let a = stream(&[("он", 1), ("сказал", 4)]);
        let b = stream(&[("«", 0), ("он", 1), ("сказал", 4)]);
        let alignment = align(&a, &b);
        assert_eq!(alignment.unmatched_primary(), 2);
        assert_eq!(alignment.dropped_secondary, vec![0, 1, 2]);
    }

    #[test]
    fn test_secondary_punctuation_dropped_when_enabled() {
        let a = stream(&[("он", 1), ("сказал", 4)]);
        let b = stream(&[("«", 0), ("он", 1), ("сказал", 4)]);
        let alignment = lenient().align(&a, &b);
        assert_eq!(alignment.count(MatchKind::Exact), 2);
        assert_eq!(alignment.dropped_secondary, vec![0]);
    }

    #[test]
    fn test_mismatch_advances_primary_only_by_default() {
        // `бы` em B está atrás de `ежели`, mas o próximo A casa com ele.
        let a = stream(&[("ежели", 5), ("бы", 11)]);
        let b = stream(&[("бы", 4)]);
        let alignment = align(&a, &b);
        assert_eq!(alignment.entries[0], AlignmentEntry::unmatched(0, MatchKind::Unmatched));
        assert_eq!(alignment.entries[1], AlignmentEntry::matched(1..2, 0..1, MatchKind::Exact));
        assert!(alignment.dropped_secondary.is_empty());
    }

    #[test]
    fn test_resync_by_offset_when_enabled() {
        let a = stream(&[("ежели", 0), ("бы", 6)]);
        let b = stream(&[("если", 0), ("бы", 6)]);
        let alignment = lenient().align(&a, &b);
        assert_eq!(alignment.entries[0], AlignmentEntry::unmatched(0, MatchKind::Unmatched));
        assert_eq!(alignment.entries[1], AlignmentEntry::matched(1..2, 1..2, MatchKind::Exact));
        assert_eq!(alignment.dropped_secondary, vec![0]);

        // Ligada, a regra pode descartar o token que o próximo A casaria.
        let a = stream(&[("ежели", 5), ("бы", 11)]);
        let b = stream(&[("бы", 4)]);
        assert_eq!(lenient().align(&a, &b).unmatched_primary(), 2);
    }

    #[test]
    fn test_secondary_to_primary_maps_split_and_negation() {
        let a = stream(&[("немедийное", 0), ("ток-шоу", 11)]);
        let b = stream(&[("не", 0), ("медийное", 2), ("ток", 11), ("-", 14), ("шоу", 15)]);
        let map = align(&a, &b).secondary_to_primary();
        assert_eq!(map.get(&0), None);
        assert_eq!(map.get(&1), Some(&0));
        assert_eq!(map.get(&2), Some(&1));
        assert_eq!(map.get(&4), Some(&1));
    }

    #[test]
    fn test_trailing_secondary_dropped_and_empty_inputs() {
        let a = stream(&[("да", 0)]);
        let b = stream(&[("да", 0), ("нет", 3), ("может", 7)]);
        assert_eq!(align(&a, &b).dropped_secondary, vec![1, 2]);

        let empty: Vec<Token> = Vec::new();
        assert!(align(&empty, &b).entries.is_empty());
        assert_eq!(align(&a, &empty).unmatched_primary(), 1);
    }

    #[test]
    fn test_decomposed_short_i_matches() {
        let a = stream(&[("мой", 0)]);
        let b = stream(&[("мои\u{306}", 0)]);
        assert_eq!(align(&a, &b).count(MatchKind::Exact), 1);
    }

    #[test]
    fn test_split_limited_by_max_pieces() {
        let config = PipelineConfig {
            max_split_pieces: 2,
            ..PipelineConfig::default()
        };
        let aligner = Aligner::from_config(&config);
        let a = stream(&[("ток-шоу", 0)]);
        let b = stream(&[("ток", 0), ("-", 3), ("шоу", 4)]);
        let alignment = aligner.align(&a, &b);
        assert_eq!(alignment.unmatched_primary(), 1);
    }

    fn token_stream() -> impl Strategy<Value = Vec<Token>> {
        let word = prop::sample::select(vec!["а", "б", "аб", "ба", "-", ",", "не", "ааб"]);
        prop::collection::vec(word, 0..12).prop_map(|words| {
            let mut offset = 0i64;
            words
                .into_iter()
                .map(|w| {
                    let token = Token::new(w, offset);
                    offset += w.chars().count() as i64 + 1;
                    token
                })
                .collect()
        })
    }

    proptest! {
        /// Todo token primário aparece em exatamente uma entrada, em ordem.
        #[test]
        fn every_primary_token_is_covered_once(a in token_stream(), b in token_stream()) {
            let alignment = align(&a, &b);
            let mut next = 0usize;
            for entry in &alignment.entries {
                prop_assert_eq!(entry.primary.start, next);
                prop_assert!(entry.primary.end > entry.primary.start);
                next = entry.primary.end;
            }
            prop_assert_eq!(next, a.len());
        }

        /// Intervalos secundários são crescentes, disjuntos e dentro dos limites.
        #[test]
        fn secondary_ranges_are_monotonic(a in token_stream(), b in token_stream()) {
            let alignment = align(&a, &b);
            let mut last_end = 0usize;
            for range in alignment.entries.iter().filter_map(|e| e.secondary.clone()) {
                prop_assert!(range.start >= last_end);
                prop_assert!(range.end <= b.len());
                last_end = range.end;
            }
        }
    }
}
