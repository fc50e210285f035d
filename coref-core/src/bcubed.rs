//! # BCubed Estendido
//!
//! Avalia uma atribuição prevista de elementos a clusters contra uma atribuição
//! de referência. Um elemento pode estar em **vários** clusters ao mesmo tempo
//! (uma menção em mais de uma cadeia), por isso as fórmulas usam interseções de
//! conjuntos em vez de igualdade de cluster.
//!
//! Sejam `C(e)` os clusters previstos de `e` e `L(e)` os de referência:
//!
//! ```text
//!                         min(|C(e1) ∩ C(e2)|, |L(e1) ∩ L(e2)|)
//! precisão_mult(e1, e2) = ─────────────────────────────────────
//!                                  |C(e1) ∩ C(e2)|
//!
//!                         min(|C(e1) ∩ C(e2)|, |L(e1) ∩ L(e2)|)
//! revocação_mult(e1, e2) = ─────────────────────────────────────
//!                                  |L(e1) ∩ L(e2)|
//! ```
//!
//! A precisão global é a média, sobre cada `e1`, da média de `precisão_mult`
//! sobre os `e2` que dividem algum cluster previsto com `e1`. A revocação é o
//! espelho, usando os clusters de referência.
//!
//! ## Elementos sem parceiros
//!
//! Um elemento que não divide cluster com ninguém (nem consigo mesmo: conjunto
//! vazio) tem média interna indefinida. [`EmptyPartnerPolicy`] decide o que
//! acontece: ignorar o elemento (padrão), contar 0 ou contar 1.
//!
//! O universo de elementos é a união das chaves das duas atribuições; uma chave
//! ausente vale como conjunto vazio.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Tratamento de elementos cuja média interna não tem termos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPartnerPolicy {
    /// O elemento fica fora da média externa.
    Skip,
    Zero,
    One,
}

impl Default for EmptyPartnerPolicy {
    fn default() -> Self {
        EmptyPartnerPolicy::Skip
    }
}

/// Mapa `elemento → conjunto de clusters`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub clusters: BTreeMap<String, BTreeSet<String>>,
}

impl ClusterAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrói a atribuição a partir de pares `(cluster, elemento)`, como as
    /// linhas `cadeia<TAB>menção` da tabela de referência.
    pub fn from_pairs<I, C, E>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, E)>,
        C: Into<String>,
        E: Into<String>,
    {
        let mut assignment = Self::new();
        for (cluster, element) in pairs {
            assignment.insert(element, cluster);
        }
        assignment
    }

    pub fn insert(&mut self, element: impl Into<String>, cluster: impl Into<String>) {
        self.clusters
            .entry(element.into())
            .or_default()
            .insert(cluster.into());
    }

    pub fn clusters_of(&self, element: &str) -> Option<&BTreeSet<String>> {
        self.clusters.get(element)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    fn shared(&self, e1: &str, e2: &str) -> usize {
        match (self.clusters.get(e1), self.clusters.get(e2)) {
            (Some(a), Some(b)) => a.intersection(b).count(),
            _ => 0,
        }
    }
}

/// Precisão, revocação e F1 de uma avaliação.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BCubedScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Avaliador BCubed sobre uma atribuição prevista e uma de referência.
#[derive(Debug, Clone)]
pub struct BCubed<'a> {
    predicted: &'a ClusterAssignment,
    gold: &'a ClusterAssignment,
    policy: EmptyPartnerPolicy,
}

impl<'a> BCubed<'a> {
    pub fn new(predicted: &'a ClusterAssignment, gold: &'a ClusterAssignment) -> Self {
        Self {
            predicted,
            gold,
            policy: EmptyPartnerPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: EmptyPartnerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `None` quando `e1` e `e2` não dividem cluster previsto.
    pub fn multiplicity_precision(&self, e1: &str, e2: &str) -> Option<f64> {
        multiplicity(self.predicted.shared(e1, e2), self.gold.shared(e1, e2))
    }

    /// `None` quando `e1` e `e2` não dividem cluster de referência.
    pub fn multiplicity_recall(&self, e1: &str, e2: &str) -> Option<f64> {
        multiplicity(self.gold.shared(e1, e2), self.predicted.shared(e1, e2))
    }

    pub fn precision(&self) -> f64 {
        averaged(self.predicted, self.gold, self.policy)
    }

    /// Mesma conta da precisão com os papéis trocados.
    pub fn recall(&self) -> f64 {
        averaged(self.gold, self.predicted, self.policy)
    }

    pub fn f1(&self) -> f64 {
        harmonic_mean(self.precision(), self.recall())
    }

    pub fn scores(&self) -> BCubedScores {
        let precision = self.precision();
        let recall = self.recall();
        BCubedScores {
            precision,
            recall,
            f1: harmonic_mean(precision, recall),
        }
    }
}

fn multiplicity(own: usize, other: usize) -> Option<f64> {
    (own > 0).then(|| own.min(other) as f64 / own as f64)
}

fn harmonic_mean(p: f64, r: f64) -> f64 {
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

/// Média externa sobre o universo; `own` define os parceiros de cada elemento.
fn averaged(own: &ClusterAssignment, other: &ClusterAssignment, policy: EmptyPartnerPolicy) -> f64 {
    let universe: BTreeSet<&str> = own
        .clusters
        .keys()
        .chain(other.clusters.keys())
        .map(String::as_str)
        .collect();

    let mut total = 0.0;
    let mut counted = 0usize;
    for &e1 in &universe {
        let terms: Vec<f64> = universe
            .iter()
            .filter_map(|&e2| multiplicity(own.shared(e1, e2), other.shared(e1, e2)))
            .collect();
        let inner = if terms.is_empty() {
            match policy {
                EmptyPartnerPolicy::Skip => continue,
                EmptyPartnerPolicy::Zero => 0.0,
                EmptyPartnerPolicy::One => 1.0,
            }
        } else {
            terms.iter().sum::<f64>() / terms.len() as f64
        };
        total += inner;
        counted += 1;
    }

    if counted == 0 {
        0.0
    } else {
        total / counted as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_same_cluster_pair_is_perfect() {
        let predicted = ClusterAssignment::from_pairs([("p1", "e1"), ("p1", "e2")]);
        let gold = ClusterAssignment::from_pairs([("g1", "e1"), ("g1", "e2")]);
        let eval = BCubed::new(&predicted, &gold);
        assert_eq!(eval.multiplicity_precision("e1", "e2"), Some(1.0));
        assert_eq!(eval.multiplicity_recall("e1", "e2"), Some(1.0));
        assert!((eval.precision() - 1.0).abs() < EPS);
        assert!((eval.recall() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_split_gold_cluster_hurts_recall_only() {
        let predicted = ClusterAssignment::from_pairs([("p1", "e1"), ("p2", "e2")]);
        let gold = ClusterAssignment::from_pairs([("g1", "e1"), ("g1", "e2")]);
        let eval = BCubed::new(&predicted, &gold);

        assert!(eval.multiplicity_recall("e1", "e2").unwrap() < 1.0);
        assert_eq!(eval.multiplicity_precision("e1", "e2"), None);
        assert_eq!(eval.multiplicity_precision("e1", "e1"), Some(1.0));
        assert!((eval.precision() - 1.0).abs() < EPS);
        assert!((eval.recall() - 0.5).abs() < EPS);
    }

    #[test]
    fn test_overlapping_membership() {
        // e1 está em duas cadeias previstas, mas só numa de referência.
        let predicted = ClusterAssignment::from_pairs([("a", "e1"), ("b", "e1"), ("a", "e2")]);
        let gold = ClusterAssignment::from_pairs([("x", "e1"), ("x", "e2")]);
        let eval = BCubed::new(&predicted, &gold);
        assert_eq!(eval.multiplicity_precision("e1", "e1"), Some(0.5));
        assert_eq!(eval.multiplicity_recall("e1", "e1"), Some(1.0));
    }

    #[test]
    fn test_empty_partner_policies() {
        // e3 só existe na referência: não tem parceiro previsto.
        let predicted = ClusterAssignment::from_pairs([("p", "e1")]);
        let gold = ClusterAssignment::from_pairs([("g", "e1"), ("g", "e3")]);

        let skip = BCubed::new(&predicted, &gold);
        assert!((skip.precision() - 1.0).abs() < EPS);

        let zero = BCubed::new(&predicted, &gold).with_policy(EmptyPartnerPolicy::Zero);
        assert!((zero.precision() - 0.5).abs() < EPS);

        let one = BCubed::new(&predicted, &gold).with_policy(EmptyPartnerPolicy::One);
        assert!((one.precision() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_all_skipped_scores_zero() {
        let empty = ClusterAssignment::new();
        let eval = BCubed::new(&empty, &empty);
        let scores = eval.scores();
        assert_eq!(scores.precision, 0.0);
        assert_eq!(scores.recall, 0.0);
        assert_eq!(scores.f1, 0.0);
    }

    #[test]
    fn test_f1() {
        let predicted = ClusterAssignment::from_pairs([("p1", "e1"), ("p2", "e2")]);
        let gold = ClusterAssignment::from_pairs([("g1", "e1"), ("g1", "e2")]);
        let f1 = BCubed::new(&predicted, &gold).f1();
        assert!((f1 - 2.0 / 3.0).abs() < EPS);
    }

    fn assignment() -> impl Strategy<Value = ClusterAssignment> {
        prop::collection::vec((0u8..4, 0u8..6), 0..16).prop_map(|pairs| {
            ClusterAssignment::from_pairs(
                pairs
                    .into_iter()
                    .map(|(c, e)| (format!("c{c}"), format!("e{e}"))),
            )
        })
    }

    proptest! {
        #[test]
        fn swapping_assignments_swaps_precision_and_recall(c in assignment(), l in assignment()) {
            let forward = BCubed::new(&c, &l);
            let backward = BCubed::new(&l, &c);
            prop_assert!((forward.precision() - backward.recall()).abs() < EPS);
            prop_assert!((forward.recall() - backward.precision()).abs() < EPS);
        }

        #[test]
        fn scores_stay_in_unit_interval(c in assignment(), l in assignment()) {
            let s = BCubed::new(&c, &l).scores();
            prop_assert!((0.0..=1.0).contains(&s.precision));
            prop_assert!((0.0..=1.0).contains(&s.recall));
            prop_assert!((0.0..=1.0).contains(&s.f1));
        }
    }
}
