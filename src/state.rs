/*      ███████╗████████╗ █████╗ ████████╗███████╗       */
/*      ██╔════╝╚══██╔══╝██╔══██╗╚══██╔══╝██╔════╝       */
/*      ███████╗   ██║   ███████║   ██║   █████╗         */
/*      ╚════██║   ██║   ██╔══██║   ██║   ██╔══╝         */
/*      ███████║   ██║   ██║  ██║   ██║   ███████╗       */
/*      ╚══════╝   ╚═╝   ╚═╝  ╚═╝   ╚═╝   ╚══════╝       */
/*     ███████████████████████████████████████████╗      */
/*     ╚══════════════════════════════════════════╝      */

use std::collections::BTreeMap;

use petgraph::{
    algo,
    graphmap::DiGraphMap,
    Direction,
};
use log::{info, warn};

use crate::analyser::{self, Diagnostic};
use crate::classify::Patterns;
use crate::function::Function;


#[derive(Clone, Debug)]
pub struct State
{
    pub patterns:       Patterns,

    /// Every parsed function, keyed by start address.
    pub functions:      BTreeMap<u32, Function>,

    /// Nodes are start addresses, an edge runs from caller to callee.
    pub g:              DiGraphMap<u32, ()>,

    /// Functions nobody calls, in address order.
    pub roots:          Vec<u32>,

    /// Strongly connected components that recurse, self calls included.
    pub cycles:         Vec< Vec<u32> >,

    /// Everything odd that was seen on the way.
    pub diagnostics:    Vec<Diagnostic>,
}


impl State
{
    /// All variables initialized to empty/zero values.
    pub fn empty() -> Self
    {
        State
        {
            patterns:       Patterns::new(),
            functions:      BTreeMap::new(),
            g:              DiGraphMap::new(),
            roots:          vec![],
            cycles:         vec![],
            diagnostics:    vec![],
        }
    }

    ///
    /// Full pass over the listing followed by call resolution, root and
    /// cycle detection. Call this once; callee sets are never touched again
    /// afterwards.
    ///
    /// Modified fields:
    /// - `functions`
    /// - `g`
    /// - `roots`
    /// - `cycles`
    /// - `diagnostics`
    ///
    pub fn analyse(&mut self, lines: &[String])
    {
        let catalog = analyser::analyse(&self.patterns, lines);
        self.functions = catalog.functions;
        self.diagnostics = catalog.diagnostics;
        info!("parsed {} functions from {} lines", self.functions.len(), lines.len());

        self.resolve_calls();
        self.find_roots();
        self.find_cycles();
    }

    pub fn function(&self, address: u32) -> Option<&Function>
    {
        self.functions.get(&address)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Function> + '_
    {
        self.roots.iter().filter_map(move |address| self.functions.get(address))
    }

    /// Functions ordered by name, for listings.
    pub fn by_name(&self) -> Vec<&Function>
    {
        let mut all: Vec<&Function> = self.functions.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Modified fields:
    /// - `functions` (callees)
    /// - `g`
    /// - `diagnostics`
    fn resolve_calls(&mut self)
    {
        self.g = DiGraphMap::new();
        for &address in self.functions.keys()
        {
            self.g.add_node(address);
        }

        let known: Vec<u32> = self.functions.keys().copied().collect();
        for func in self.functions.values_mut()
        {
            for &target in &func.call_addresses
            {
                if known.binary_search(&target).is_ok()
                {
                    func.callees.insert(target);
                    self.g.add_edge(func.start_address, target, ());
                }
                else
                {
                    warn!("missing function {:X} in {}", target, func.name);
                    self.diagnostics.push(Diagnostic::MissingFunction
                    {
                        caller:  func.name.clone(),
                        address: target,
                    });
                }
            }
        }
    }

    /// Modified fields:
    /// - `roots`
    fn find_roots(&mut self)
    {
        self.roots = self.functions
            .keys()
            .copied()
            .filter(|&address| self.g
                .neighbors_directed(address, Direction::Incoming)
                .next()
                .is_none())
            .collect();
    }

    /// Modified fields:
    /// - `cycles`
    fn find_cycles(&mut self)
    {
        self.cycles.clear();
        for mut scc in algo::kosaraju_scc(&self.g)
        {
            let first = scc[0];
            let is_a_cycle = scc.len() > 1 || self.g.contains_edge(first, first);
            if is_a_cycle
            {
                scc.sort_unstable();
                let names: Vec<&str> = scc
                    .iter()
                    .filter_map(|address| self.functions.get(address))
                    .map(|f| f.name.as_str())
                    .collect();
                warn!("recursion between {:?}; stack usage is only a lower bound", names);
                self.cycles.push(scc);
            }
        }
        self.cycles.sort();
    }
}
