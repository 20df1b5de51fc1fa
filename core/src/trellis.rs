//! The forward Viterbi trellis: one column per matrix column, each column a
//! token-keyed set of bounded top-k nodes.
//!
//! A node keeps at most `nstore` hypotheses in a min-heap under the custom
//! ordering below, so the weakest retained hypothesis sits at the root and
//! is the one a stronger newcomer evicts. Back-references are `(column,
//! prev_token, sub_index)` triples resolved through the trellis at
//! extraction time; nothing owns anything across columns, so dropping the
//! trellis drops the whole decode.

use crate::phrase::{Token, NULL_TOKEN};
use ahash::AHashMap;

/// Log-probability bonus a one-character-longer hypothesis must overcome
/// before it beats a shorter one.
fn long_sentence_penalty() -> f32 {
    1.2f32.ln()
}

/// One decoding hypothesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrellisValue {
    pub prev_token: Token,
    pub cur_token: Token,
    /// Character length of the sentence decoded so far.
    pub sentence_length: i32,
    /// Accumulated natural-log probability.
    pub poss: f32,
    /// Column of the predecessor hypothesis, -1 for roots.
    pub last_step: i32,
    /// Index of the predecessor inside its node.
    pub sub_index: i32,
    /// This value's own index inside its node; stamped by
    /// `TrellisNode::number` before successors link to it.
    pub current_index: i32,
}

impl TrellisValue {
    pub fn new(poss: f32) -> Self {
        TrellisValue {
            prev_token: NULL_TOKEN,
            cur_token: NULL_TOKEN,
            sentence_length: 0,
            poss,
            last_step: -1,
            sub_index: -1,
            current_index: -1,
        }
    }
}

/// "lhs loses to rhs".
///
/// Same-length hypotheses compare by probability. With multi-hypothesis
/// nodes, hypotheses one character apart compare by penalty-shifted
/// probability: the longer one wins only when it leads by more than
/// `ln(1.2)`. Any other length difference is decided by length alone, the
/// one emitting fewer characters for the same span winning. Irreflexive
/// and asymmetric (adjacent lengths decide in one clause, so the relation
/// cannot hold both ways); not a total order.
pub fn trellis_value_less_than(nstore: usize, lhs: &TrellisValue, rhs: &TrellisValue) -> bool {
    if nstore > 1 {
        if lhs.sentence_length + 1 == rhs.sentence_length {
            return lhs.poss + long_sentence_penalty() < rhs.poss;
        }
        if lhs.sentence_length == rhs.sentence_length + 1 {
            return lhs.poss < rhs.poss + long_sentence_penalty();
        }
    }

    if lhs.sentence_length == rhs.sentence_length && lhs.poss < rhs.poss {
        return true;
    }

    if lhs.sentence_length > rhs.sentence_length {
        return true;
    }

    false
}

fn sift_up<F>(values: &mut [TrellisValue], mut index: usize, less: &F)
where
    F: Fn(&TrellisValue, &TrellisValue) -> bool,
{
    while index > 0 {
        let parent = (index - 1) / 2;
        if less(&values[index], &values[parent]) {
            values.swap(index, parent);
            index = parent;
        } else {
            break;
        }
    }
}

fn sift_down<F>(values: &mut [TrellisValue], mut index: usize, less: &F)
where
    F: Fn(&TrellisValue, &TrellisValue) -> bool,
{
    loop {
        let mut smallest = index;
        for child in [2 * index + 1, 2 * index + 2] {
            if child < values.len() && less(&values[child], &values[smallest]) {
                smallest = child;
            }
        }
        if smallest == index {
            break;
        }
        values.swap(index, smallest);
        index = smallest;
    }
}

/// Bounded top-k container: a min-heap of at most `nstore` values under
/// `trellis_value_less_than`, so the retained values are the k maximal ones
/// ever offered. `nstore == 1` behaves as a single best slot.
#[derive(Debug, Clone)]
pub struct TrellisNode {
    nstore: usize,
    values: Vec<TrellisValue>,
}

impl TrellisNode {
    pub fn new(nstore: usize) -> Self {
        debug_assert!(nstore >= 1);
        TrellisNode {
            nstore,
            values: Vec::with_capacity(nstore),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[TrellisValue] {
        &self.values
    }

    /// Stamp every retained value with its position, so successors created
    /// from it can record a resolvable `sub_index`.
    pub fn number(&mut self) {
        for (index, value) in self.values.iter_mut().enumerate() {
            value.current_index = index as i32;
        }
    }

    /// Offer a value; returns whether it was kept.
    pub fn eval_item(&mut self, item: &TrellisValue) -> bool {
        let nstore = self.nstore;
        let less = |a: &TrellisValue, b: &TrellisValue| trellis_value_less_than(nstore, a, b);

        if self.values.len() < self.nstore {
            self.values.push(*item);
            let last = self.values.len() - 1;
            sift_up(&mut self.values, last, &less);
            return true;
        }

        // full: the root is the weakest retained value
        if less(&self.values[0], item) {
            self.values[0] = *item;
            sift_down(&mut self.values, 0, &less);
            return true;
        }

        false
    }
}

/// Heap-select the `num` greatest candidates under the hypothesis ordering.
/// Selection sorts only as far as needed; ties keep observation order
/// stable enough for deterministic decodes.
pub fn get_top_results(
    nstore: usize,
    num: usize,
    candidates: &[TrellisValue],
) -> Vec<TrellisValue> {
    if candidates.is_empty() || num == 0 {
        return Vec::new();
    }

    // max-heap: flip the comparator
    let greater = |a: &TrellisValue, b: &TrellisValue| trellis_value_less_than(nstore, b, a);

    let mut heap = candidates.to_vec();
    for index in (0..heap.len() / 2).rev() {
        sift_down(&mut heap, index, &greater);
    }

    let mut out = Vec::with_capacity(num.min(heap.len()));
    let mut len = heap.len();
    while len > 0 && out.len() < num {
        out.push(heap[0]);
        heap[0] = heap[len - 1];
        len -= 1;
        sift_down(&mut heap[..len], 0, &greater);
    }
    out
}

/// The N-column trellis.
#[derive(Debug)]
pub struct ForwardPhoneticTrellis {
    nstore: usize,
    steps_index: Vec<AHashMap<Token, usize>>,
    steps_content: Vec<Vec<TrellisNode>>,
}

impl ForwardPhoneticTrellis {
    pub fn new(nstore: usize) -> Self {
        ForwardPhoneticTrellis {
            nstore,
            steps_index: Vec::new(),
            steps_content: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        debug_assert_eq!(self.steps_index.len(), self.steps_content.len());
        self.steps_index.len()
    }

    pub fn clear(&mut self) {
        self.steps_index.clear();
        self.steps_content.clear();
    }

    pub fn prepare(&mut self, nstep: usize) {
        self.clear();
        self.steps_index.resize_with(nstep, AHashMap::new);
        self.steps_content.resize_with(nstep, Vec::new);
    }

    /// Seed column 0 with the given sentence prefixes at probability 1.
    pub fn fill_prefixes(&mut self, prefixes: &[Token]) {
        assert!(!prefixes.is_empty());

        for &token in prefixes {
            let mut value = TrellisValue::new(0.0);
            value.cur_token = token;
            self.insert_candidate(0, token, &value);
        }
    }

    /// All values of one column, numbered so successors can link back.
    pub fn get_candidates(&mut self, index: usize) -> Vec<TrellisValue> {
        let mut out = Vec::new();
        for node in &mut self.steps_content[index] {
            node.number();
            out.extend_from_slice(node.values());
        }
        out
    }

    /// Offer a value to the node of `token` at `index`, creating the node
    /// on first sight. Returns whether the value was kept.
    pub fn insert_candidate(&mut self, index: usize, token: Token, candidate: &TrellisValue) -> bool {
        let step_index = &mut self.steps_index[index];
        let step_content = &mut self.steps_content[index];

        match step_index.get(&token) {
            Some(&node_index) => step_content[node_index].eval_item(candidate),
            None => {
                let mut node = TrellisNode::new(self.nstore);
                let kept = node.eval_item(candidate);
                debug_assert!(kept);
                step_content.push(node);
                step_index.insert(token, step_content.len() - 1);
                true
            }
        }
    }

    /// Resolve a back-reference.
    pub fn get_candidate(&self, index: usize, token: Token, sub_index: i32) -> Option<&TrellisValue> {
        if sub_index < 0 {
            return None;
        }
        let node_index = *self.steps_index.get(index)?.get(&token)?;
        self.steps_content[index][node_index]
            .values()
            .get(sub_index as usize)
    }

    /// The `nbest` best hypotheses of the last column, sorted by raw
    /// probability, best first.
    pub fn get_tails(&mut self, nbest: usize) -> Vec<TrellisValue> {
        let tail_index = self.size() - 1;
        let candidates = self.get_candidates(tail_index);
        let mut tails = get_top_results(self.nstore, nbest, &candidates);
        tails.sort_by(|a, b| b.poss.total_cmp(&a.poss));
        tails
    }
}

/// A decoded sentence: length-N array with the word token at each span's
/// start column, `NULL_TOKEN` elsewhere.
pub type MatchResult = Vec<Token>;

/// Backtrace one tail hypothesis into a `MatchResult`.
pub fn extract_result(trellis: &ForwardPhoneticTrellis, tail: &TrellisValue) -> MatchResult {
    let mut result = vec![NULL_TOKEN; trellis.size()];

    let mut cursor = *tail;
    while cursor.last_step >= 0 {
        let index = cursor.last_step as usize;
        result[index] = cursor.cur_token;

        cursor = *trellis
            .get_candidate(index, cursor.prev_token, cursor.sub_index)
            .expect("trellis back-reference resolves");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(length: i32, poss: f32) -> TrellisValue {
        let mut v = TrellisValue::new(poss);
        v.sentence_length = length;
        v
    }

    #[test]
    fn ordering_same_length_by_probability() {
        let weak = value(2, -5.0);
        let strong = value(2, -1.0);
        assert!(trellis_value_less_than(1, &weak, &strong));
        assert!(!trellis_value_less_than(1, &strong, &weak));
    }

    #[test]
    fn ordering_prefers_fewer_characters() {
        // same span, one parse emitting three characters and one emitting
        // one; the terser parse dominates regardless of probability
        let long = value(3, -1.0);
        let short = value(1, -5.0);
        assert!(trellis_value_less_than(1, &long, &short));
        assert!(!trellis_value_less_than(1, &short, &long));
    }

    #[test]
    fn ordering_penalty_clause_only_with_multi_store() {
        let shorter = value(2, -1.0);
        let trailing = value(3, -1.1);
        let leading = value(3, -0.5);

        // nstore=1: length decides outright
        assert!(trellis_value_less_than(1, &trailing, &shorter));
        assert!(trellis_value_less_than(1, &leading, &shorter));

        // nstore>1: one character apart, the longer hypothesis wins only
        // when it leads by more than ln(1.2)
        assert!(trellis_value_less_than(2, &trailing, &shorter));
        assert!(!trellis_value_less_than(2, &shorter, &trailing));
        assert!(trellis_value_less_than(2, &shorter, &leading));
        assert!(!trellis_value_less_than(2, &leading, &shorter));
    }

    #[test]
    fn ordering_is_irreflexive_and_asymmetric_on_samples() {
        let samples = [
            value(0, 0.0),
            value(1, -0.5),
            value(1, -0.7),
            value(2, -0.6),
            value(2, -0.9),
            value(3, -1.5),
        ];
        for nstore in [1usize, 2, 4] {
            for a in &samples {
                assert!(!trellis_value_less_than(nstore, a, a));
                for b in &samples {
                    if trellis_value_less_than(nstore, a, b) {
                        assert!(!trellis_value_less_than(nstore, b, a));
                    }
                }
            }
        }
    }

    #[test]
    fn node_keeps_the_maximal_values() {
        let mut node = TrellisNode::new(2);
        assert!(node.eval_item(&value(2, -9.0)));
        assert!(node.eval_item(&value(2, -1.0)));
        // weaker than both retained values
        assert!(!node.eval_item(&value(2, -10.0)));
        // evicts the weakest
        assert!(node.eval_item(&value(2, -2.0)));

        assert_eq!(node.len(), 2);
        let mut posses: Vec<f32> = node.values().iter().map(|v| v.poss).collect();
        posses.sort_by(f32::total_cmp);
        assert_eq!(posses, vec![-2.0, -1.0]);
    }

    #[test]
    fn single_store_node_replaces() {
        let mut node = TrellisNode::new(1);
        assert!(node.eval_item(&value(1, -3.0)));
        assert!(!node.eval_item(&value(1, -4.0)));
        assert!(node.eval_item(&value(1, -2.0)));
        assert_eq!(node.len(), 1);
        assert_eq!(node.values()[0].poss, -2.0);
    }

    #[test]
    fn top_results_selects_greatest_first() {
        let candidates = vec![
            value(2, -3.0),
            value(2, -1.0),
            value(2, -2.0),
            value(2, -4.0),
        ];
        let top = get_top_results(1, 2, &candidates);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].poss, -1.0);
        assert_eq!(top[1].poss, -2.0);

        assert!(get_top_results(1, 0, &candidates).is_empty());
        assert!(get_top_results(1, 2, &[]).is_empty());
    }

    #[test]
    fn trellis_insert_and_backtrace() {
        let mut trellis = ForwardPhoneticTrellis::new(1);
        trellis.prepare(3);
        trellis.fill_prefixes(&[1]);

        let roots = trellis.get_candidates(0);
        assert_eq!(roots.len(), 1);
        let root = roots[0];

        // word 7 spanning [0, 2)
        let mut step = TrellisValue::new(-1.0);
        step.prev_token = root.cur_token;
        step.cur_token = 7;
        step.sentence_length = 1;
        step.last_step = 0;
        step.sub_index = root.current_index;
        assert!(trellis.insert_candidate(2, 7, &step));

        let tails = trellis.get_tails(1);
        assert_eq!(tails.len(), 1);

        let result = extract_result(&trellis, &tails[0]);
        assert_eq!(result, vec![7, NULL_TOKEN, NULL_TOKEN]);
    }
}
