//! # Floresta de Dependências
//!
//! O analisador sintático entrega, para cada token, o offset do seu pai. Um token
//! cujo pai é ele mesmo é uma **raiz** (auto-referência, não um ciclo real: quer
//! dizer "sem pai").
//!
//! ```text
//!   (5, 5)   читал      ← raiz
//!   (0, 5)   Мальчик    ← filho de 5
//!   (11, 5)  книгу      ← filho de 5
//!   (17, 11) брата      ← filho de 11
//!
//!            читал(5)
//!           /        \
//!    Мальчик(0)    книгу(11)
//!                      |
//!                  брата(17)
//! ```
//!
//! ## Arena
//!
//! Os nós vivem num `Vec` e os filhos são índices nesse vetor. Nenhum nó guarda
//! referência para outro, então a floresta é só dados e pode ser clonada,
//! serializada e enviada entre threads sem cerimônia.
//!
//! ## Construção em duas passadas
//!
//! 1. Um nó por id distinto. Se um id aparece mais de uma vez, o último pai vence.
//! 2. Ligação: auto-referência vira raiz; os demais são anexados ao nó do pai.
//!    Um pai inexistente é erro de integridade ([`Error::OrphanParent`]).
//!
//! Por fim, nós que nenhuma raiz alcança (pais formando ciclo) são rejeitados
//! com [`Error::CyclicDependency`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::TokenAnnotation;

/// Um nó da floresta. `children` são índices na arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: i64,
    pub parent_id: i64,
    pub children: Vec<usize>,
}

impl TreeNode {
    pub fn is_root(&self) -> bool {
        self.id == self.parent_id
    }
}

/// Floresta de dependências indexada por arena.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyForest {
    nodes: Vec<TreeNode>,
    #[serde(skip)]
    index: HashMap<i64, usize>,
    roots: Vec<usize>,
}

impl DependencyForest {
    /// Constrói a floresta a partir de pares `(id, parent_id)`.
    pub fn build(pairs: &[(i64, i64)]) -> Result<Self> {
        let mut forest = Self::default();

        for &(id, parent_id) in pairs {
            match forest.index.get(&id) {
                Some(&idx) => forest.nodes[idx].parent_id = parent_id,
                None => {
                    forest.index.insert(id, forest.nodes.len());
                    forest.nodes.push(TreeNode {
                        id,
                        parent_id,
                        children: Vec::new(),
                    });
                }
            }
        }

        for idx in 0..forest.nodes.len() {
            let TreeNode { id, parent_id, .. } = forest.nodes[idx];
            if id == parent_id {
                forest.roots.push(idx);
                continue;
            }
            let parent = *forest
                .index
                .get(&parent_id)
                .ok_or(Error::OrphanParent { id, parent_id })?;
            forest.nodes[parent].children.push(idx);
        }

        forest.check_reachable()?;
        Ok(forest)
    }

    /// Pares `(offset, parent_offset)` de um fluxo anotado.
    pub fn from_annotations(annotations: &[TokenAnnotation]) -> Result<Self> {
        let pairs: Vec<(i64, i64)> = annotations
            .iter()
            .map(|a| (a.offset(), a.parent_offset()))
            .collect();
        Self::build(&pairs)
    }

    fn check_reachable(&self) -> Result<()> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = self.roots.clone();
        while let Some(idx) = stack.pop() {
            if std::mem::replace(&mut seen[idx], true) {
                continue;
            }
            stack.extend(&self.nodes[idx].children);
        }

        let mut orphans: Vec<i64> = self
            .nodes
            .iter()
            .zip(&seen)
            .filter(|(_, reached)| !**reached)
            .map(|(node, _)| node.id)
            .collect();
        if orphans.is_empty() {
            Ok(())
        } else {
            orphans.sort_unstable();
            Err(Error::CyclicDependency { ids: orphans })
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Raízes na ordem em que aparecem na entrada.
    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.roots.iter().map(|&idx| &self.nodes[idx])
    }

    pub fn node(&self, id: i64) -> Option<&TreeNode> {
        self.index.get(&id).map(|&idx| &self.nodes[idx])
    }

    /// Filhos diretos de um nó.
    pub fn children<'a>(&'a self, node: &'a TreeNode) -> impl Iterator<Item = &'a TreeNode> + 'a {
        node.children.iter().map(|&idx| &self.nodes[idx])
    }

    /// Todos os descendentes de `node` (sem ele), em pré-ordem.
    pub fn descendants<'a>(&'a self, node: &'a TreeNode) -> Vec<&'a TreeNode> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = node.children.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            let current = &self.nodes[idx];
            out.push(current);
            stack.extend(current.children.iter().rev());
        }
        out
    }

    /// Ids da subárvore de `id` (incluindo ele), em ordem crescente.
    ///
    /// A ordem dos ids é a ordem dos tokens no texto. Devolve vazio se o id não
    /// existe.
    pub fn subtree_ids(&self, id: i64) -> Vec<i64> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let mut ids: Vec<i64> = std::iter::once(node.id)
            .chain(self.descendants(node).into_iter().map(|n| n.id))
            .collect();
        ids.sort_unstable();
        ids
    }
}
