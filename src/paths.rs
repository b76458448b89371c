use std::collections::{BTreeMap, HashSet};

use crate::function::Function;
use crate::state::State;
use crate::RETURN_ADDRESS_BYTES;


/// One function along a call path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathStep
{
    pub address:       u32,
    pub name:          String,
    /// Own stack usage plus the return address.
    pub contribution:  i64,
    /// Sum of the contributions from the root down to and including this step.
    pub running_total: i64,
}

/// A root to leaf call chain and the stack it needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackPath
{
    pub steps:     Vec<PathStep>,
    pub total:     i64,
    /// The last step is a function that was already on the path.
    pub recursion: bool,
}

impl StackPath
{
    fn single(func: &Function, recursion: bool) -> Self
    {
        let contribution = func.stack_used + RETURN_ADDRESS_BYTES;
        StackPath
        {
            steps: vec![PathStep
            {
                address:       func.start_address,
                name:          func.short_name.clone(),
                contribution,
                running_total: 0,
            }],
            total: contribution,
            recursion,
        }
    }

    // steps are collected leaf first while unwinding
    fn push_caller(&mut self, func: &Function)
    {
        let contribution = func.stack_used + RETURN_ADDRESS_BYTES;
        self.steps.push(PathStep
        {
            address:       func.start_address,
            name:          func.short_name.clone(),
            contribution,
            running_total: 0,
        });
        self.total += contribution;
    }

    fn finish(&mut self)
    {
        self.steps.reverse();
        let mut running = 0;
        for step in &mut self.steps
        {
            running += step.contribution;
            step.running_total = running;
        }
    }
}


struct Frame<'f>
{
    func:    &'f Function,
    callees: Vec<u32>,
    next:    usize,
    paths:   Vec<StackPath>,
}

impl<'f> Frame<'f>
{
    fn new(func: &'f Function) -> Self
    {
        Frame
        {
            func,
            callees: func.callees.iter().copied().collect(),
            next:    0,
            paths:   vec![],
        }
    }
}

///
/// Every call path starting at `start`, depth first.
///
/// A function is on `on_path` exactly while it is being expanded. Meeting it
/// again below itself yields a single recursion cutoff step and no further
/// expansion; meeting it on a sibling branch expands it again.
///
pub fn call_graphs(functions: &BTreeMap<u32, Function>, start: u32) -> Vec<StackPath>
{
    let root = match functions.get(&start)
    {
        Some(root) => root,
        None       => return vec![],
    };

    let mut on_path: HashSet<u32> = HashSet::new();
    let mut stack: Vec<Frame> = vec![];

    on_path.insert(start);
    stack.push(Frame::new(root));

    while let Some(top) = stack.last_mut()
    {
        if top.next < top.callees.len()
        {
            let address = top.callees[top.next];
            top.next += 1;

            let callee = match functions.get(&address)
            {
                Some(callee) => callee,
                None         => continue,
            };
            if on_path.contains(&address)
            {
                top.paths.push(StackPath::single(callee, true));
            }
            else
            {
                on_path.insert(address);
                stack.push(Frame::new(callee));
            }
            continue;
        }

        let done = match stack.pop()
        {
            Some(done) => done,
            None       => break,
        };
        on_path.remove(&done.func.start_address);

        let mut paths = done.paths;
        if paths.is_empty()
        {
            paths.push(StackPath::single(done.func, false));
        }
        else
        {
            for path in &mut paths
            {
                path.push_caller(done.func);
            }
        }

        match stack.last_mut()
        {
            Some(parent) => parent.paths.extend(paths),
            None         =>
            {
                for path in &mut paths
                {
                    path.finish();
                }
                return paths;
            }
        }
    }

    vec![]
}

/// The first path with the largest total.
pub fn worst_case(paths: &[StackPath]) -> Option<&StackPath>
{
    paths.iter().fold(None, |worst: Option<&StackPath>, path| match worst
    {
        Some(w) if w.total >= path.total => Some(w),
        _                                => Some(path),
    })
}


impl State
{
    pub fn call_graphs(&self, root: u32) -> Vec<StackPath>
    {
        call_graphs(&self.functions, root)
    }

    /// Worst path of every root, largest first.
    pub fn worst_paths(&self) -> Vec<StackPath>
    {
        let mut worst: Vec<StackPath> = self.roots
            .iter()
            .filter_map(|&root| worst_case(&self.call_graphs(root)).cloned())
            .collect();
        worst.sort_by(|a, b| b.total.cmp(&a.total));
        worst
    }

    /// Every path of every root, largest first.
    pub fn all_paths(&self) -> Vec<StackPath>
    {
        let mut all: Vec<StackPath> = self.roots
            .iter()
            .flat_map(|&root| self.call_graphs(root))
            .collect();
        all.sort_by(|a, b| b.total.cmp(&a.total));
        all
    }
}


#[cfg(test)]
mod tests
{
    use super::*;

    fn table(rows: &[(u32, &str, i64, &[u32])]) -> BTreeMap<u32, Function>
    {
        rows.iter()
            .map(|&(address, name, used, callees)|
            {
                let mut f = Function::new(name, address, 0);
                f.stack_used = used;
                f.callees = callees.iter().copied().collect();
                f.call_addresses = f.callees.clone();
                (address, f)
            })
            .collect()
    }

    fn names(path: &StackPath) -> Vec<&str>
    {
        path.steps.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn push_then_call()
    {
        let t = table(&[(0x100, "a", 1, &[0x200]), (0x200, "b", 0, &[])]);
        let paths = call_graphs(&t, 0x100);

        assert_eq!(paths.len(), 1);
        let worst = worst_case(&paths).unwrap();
        assert_eq!(worst.total, 5);
        assert_eq!(names(worst), vec!["a", "b"]);
        assert_eq!(
            worst.steps.iter().map(|s| (s.contribution, s.running_total)).collect::<Vec<_>>(),
            vec![(3, 3), (2, 5)]
        );
        assert!(!worst.recursion);
    }

    #[test]
    fn leaf_root_is_its_own_path()
    {
        let t = table(&[(0x100, "isr", 4, &[])]);
        let paths = call_graphs(&t, 0x100);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].total, 6);
    }

    #[test]
    fn self_recursion_is_cut_once()
    {
        let t = table(&[(0x100, "main", 0, &[0x200]), (0x200, "fact", 3, &[0x200])]);
        let paths = call_graphs(&t, 0x100);

        assert_eq!(paths.len(), 1);
        assert!(paths[0].recursion);
        assert_eq!(names(&paths[0]), vec!["main", "fact", "fact"]);
        assert_eq!(paths[0].total, 2 + 5 + 5);
        assert_eq!(paths.iter().filter(|p| p.recursion).count(), 1);
    }

    #[test]
    fn mutual_recursion_terminates()
    {
        let t = table(&[
            (0x100, "main", 0, &[0x200]),
            (0x200, "ping", 1, &[0x300]),
            (0x300, "pong", 2, &[0x200]),
        ]);
        let paths = call_graphs(&t, 0x100);
        assert_eq!(paths.len(), 1);
        assert_eq!(names(&paths[0]), vec!["main", "ping", "pong", "ping"]);
        assert_eq!(paths[0].total, 2 + 3 + 4 + 3);
    }

    #[test]
    fn diamond_is_not_recursion()
    {
        let t = table(&[
            (0x100, "root", 0, &[0x200, 0x300]),
            (0x200, "left", 1, &[0x400]),
            (0x300, "right", 5, &[0x400]),
            (0x400, "shared", 2, &[]),
        ]);
        let paths = call_graphs(&t, 0x100);

        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| !p.recursion));
        assert_eq!(names(&paths[0]), vec!["root", "left", "shared"]);
        assert_eq!(names(&paths[1]), vec!["root", "right", "shared"]);
        assert_eq!(worst_case(&paths).unwrap().total, 2 + 7 + 4);
    }

    #[test]
    fn totals_are_the_sum_of_contributions()
    {
        let t = table(&[
            (0x100, "root", 7, &[0x200, 0x300]),
            (0x200, "mid", 1, &[0x300]),
            (0x300, "leaf", 30, &[]),
        ]);
        for path in call_graphs(&t, 0x100)
        {
            let expected: i64 = path.steps
                .iter()
                .map(|s| t[&s.address].stack_used + RETURN_ADDRESS_BYTES)
                .sum();
            assert_eq!(path.total, expected);
            assert_eq!(path.steps.last().unwrap().running_total, expected);
        }
    }

    #[test]
    fn ties_keep_the_first_path()
    {
        let t = table(&[
            (0x100, "root", 0, &[0x200, 0x300]),
            (0x200, "first", 1, &[]),
            (0x300, "second", 1, &[]),
        ]);
        let paths = call_graphs(&t, 0x100);
        assert_eq!(names(worst_case(&paths).unwrap()), vec!["root", "first"]);
    }

    #[test]
    fn unknown_start_has_no_paths()
    {
        let t = table(&[(0x100, "a", 0, &[])]);
        assert!(call_graphs(&t, 0x999).is_empty());
    }
}
