//! The n-best phonetic decoder and its training counterpart.
//!
//! `get_nbest_match` runs a beam-pruned Viterbi search over the key matrix:
//! every unconstrained column spawns span searches widening to the right
//! until the phonetic index reports no continuation, and each matched span
//! extends the column's beam with bigram-scored and unigram-scored
//! successors under the interpolated language model. Pinned spans decode
//! through exactly one forced step. `train_result` back-propagates a
//! committed sentence into the user bigram store and the per-word
//! pronunciation and unigram counts.

use crate::bigram::Bigram;
use crate::constraints::{Constraint, ForwardPhoneticConstraints};
use crate::matrix::PhoneticKeyMatrix;
use crate::phonetic_index::{empty_ranges, PhoneticIndex, PhraseIndexRanges, SearchResult};
use crate::phrase::{PhraseIndex, Token, NULL_TOKEN, SENTENCE_START};
use crate::search::{
    compute_pronunciation_possibility, increase_pronunciation_possibility, search_matrix,
};
use crate::single_gram::merge_single_gram;
use crate::trellis::{
    extract_result, get_top_results, ForwardPhoneticTrellis, MatchResult, TrellisValue,
};
use crate::Config;
use std::sync::Arc;
use tracing::debug;

/// Beam width per trellis column.
const NBEAM: usize = 32;

/// The collaborators one decoder instance works against. The phonetic
/// index and the system bigram are immutable and shared between instances;
/// the phrase index and the user bigram absorb training updates.
#[derive(Debug)]
pub struct Model {
    pub phonetic_index: Arc<PhoneticIndex>,
    pub phrase_index: PhraseIndex,
    pub system_bigram: Arc<Bigram>,
    pub user_bigram: Bigram,
}

impl Model {
    pub fn new(
        phonetic_index: PhoneticIndex,
        phrase_index: PhraseIndex,
        system_bigram: Bigram,
        user_bigram: Bigram,
    ) -> Self {
        Model {
            phonetic_index: Arc::new(phonetic_index),
            phrase_index,
            system_bigram: Arc::new(system_bigram),
            user_bigram,
        }
    }
}

/// Ranked decode results, best first.
#[derive(Debug, Clone, Default)]
pub struct NBestMatchResults {
    results: Vec<MatchResult>,
}

impl NBestMatchResults {
    pub fn new() -> Self {
        NBestMatchResults::default()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MatchResult> {
        self.results.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchResult> {
        self.results.iter()
    }

    pub fn add(&mut self, result: MatchResult) {
        self.results.push(result);
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }
}

/// The decoder. Holds the interpolation weights and the per-decode
/// trellis; collaborators arrive per call so training can borrow them
/// mutably.
#[derive(Debug)]
pub struct PhoneticLookup {
    bigram_lambda: f32,
    unigram_lambda: f32,
    nstore: usize,
    nbest: usize,
    trellis: ForwardPhoneticTrellis,
}

impl PhoneticLookup {
    /// `lambda` weights the bigram against the unigram probability;
    /// `nstore` bounds hypotheses kept per (column, token) node and `nbest`
    /// the number of extracted results.
    pub fn new(lambda: f32, nstore: usize, nbest: usize) -> Self {
        assert!((0.0..=1.0).contains(&lambda));
        assert!(nstore >= 1 && nstore <= nbest);

        PhoneticLookup {
            bigram_lambda: lambda,
            unigram_lambda: 1.0 - lambda,
            nstore,
            nbest,
            trellis: ForwardPhoneticTrellis::new(nstore),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        PhoneticLookup::new(config.lambda, config.nstore, config.nbest)
    }

    /// Decode the matrix into up to `nbest` ranked sentences.
    pub fn get_nbest_match(
        &mut self,
        prefixes: &[Token],
        matrix: &PhoneticKeyMatrix,
        constraints: &ForwardPhoneticConstraints,
        model: &Model,
    ) -> NBestMatchResults {
        let mut results = NBestMatchResults::new();

        let nstep = matrix.size();
        if nstep <= 1 {
            return results;
        }

        self.trellis.clear();
        self.trellis.prepare(nstep);
        self.trellis.fill_prefixes(prefixes);

        for i in 0..nstep - 1 {
            let cur_constraint = constraints.get(i);
            if matches!(cur_constraint, Constraint::NoSearch { .. }) {
                continue;
            }

            let candidates = self.trellis.get_candidates(i);
            let topresults = get_top_results(self.nstore, NBEAM, &candidates);
            if topresults.is_empty() {
                continue;
            }

            if let Constraint::OneStep { end, .. } = cur_constraint {
                if end >= nstep {
                    continue;
                }
                let mut ranges = empty_ranges();
                let retval = search_matrix(&model.phonetic_index, matrix, i, end, &mut ranges);

                if retval.contains(SearchResult::OK) {
                    self.search_bigram(&topresults, i, end, &ranges, constraints, matrix, model);
                    self.search_unigram(&topresults, i, end, &ranges, constraints, matrix, model);
                }
                continue;
            }

            for m in i + 1..nstep {
                if matches!(constraints.get(m), Constraint::NoSearch { .. }) {
                    break;
                }

                let mut ranges = empty_ranges();
                let retval = search_matrix(&model.phonetic_index, matrix, i, m, &mut ranges);

                if retval.contains(SearchResult::OK) {
                    self.search_bigram(&topresults, i, m, &ranges, constraints, matrix, model);
                    self.search_unigram(&topresults, i, m, &ranges, constraints, matrix, model);
                }

                // no longer phonetic content past this column
                if !retval.contains(SearchResult::CONTINUED) {
                    break;
                }
            }
        }

        let tails = self.trellis.get_tails(self.nbest);
        for tail in &tails {
            results.add(extract_result(&self.trellis, tail));
        }

        debug!(
            steps = nstep,
            results = results.len(),
            "nbest decode finished"
        );

        results
    }

    /// Bigram expansion: every beam hypothesis extends with the next tokens
    /// its merged system+user distribution lists inside the matched ranges.
    #[allow(clippy::too_many_arguments)]
    fn search_bigram(
        &mut self,
        topresults: &[TrellisValue],
        start: usize,
        end: usize,
        ranges: &PhraseIndexRanges,
        constraints: &ForwardPhoneticConstraints,
        matrix: &PhoneticKeyMatrix,
        model: &Model,
    ) -> bool {
        let constraint = constraints.get(start);
        let mut found = false;

        for value in topresults {
            let index_token = value.cur_token;

            let system = model.system_bigram.load(index_token);
            let user = model.user_bigram.load(index_token);
            let merged = match merge_single_gram(system.as_ref(), user.as_ref()) {
                Some(merged) => merged,
                None => continue,
            };

            match constraint {
                Constraint::OneStep {
                    token,
                    end: constraint_end,
                } => {
                    if let Some(freq) = merged.get_freq(token) {
                        let total_freq = merged.get_total_freq();
                        if total_freq > 0 {
                            let bigram_poss = freq as f32 / total_freq as f32;
                            found |= self.bigram_gen_next_step(
                                start,
                                constraint_end,
                                value,
                                token,
                                bigram_poss,
                                matrix,
                                model,
                            );
                        }
                    }
                }
                Constraint::NoConstraint => {
                    for library in ranges.iter() {
                        for range in library {
                            for (token, freq) in merged.search(range) {
                                found |= self.bigram_gen_next_step(
                                    start, end, value, token, freq, matrix, model,
                                );
                            }
                        }
                    }
                }
                Constraint::NoSearch { .. } => {}
            }
        }

        found
    }

    /// Unigram expansion: the best beam hypothesis extends with every token
    /// of the matched ranges, regardless of bigram evidence.
    #[allow(clippy::too_many_arguments)]
    fn search_unigram(
        &mut self,
        topresults: &[TrellisValue],
        start: usize,
        end: usize,
        ranges: &PhraseIndexRanges,
        constraints: &ForwardPhoneticConstraints,
        matrix: &PhoneticKeyMatrix,
        model: &Model,
    ) -> bool {
        let max = match topresults.first() {
            Some(max) => *max,
            None => return false,
        };

        match constraints.get(start) {
            Constraint::OneStep {
                token,
                end: constraint_end,
            } => self.unigram_gen_next_step(start, constraint_end, &max, token, matrix, model),
            Constraint::NoConstraint => {
                let mut found = false;
                for library in ranges.iter() {
                    for range in library {
                        for token in range.begin..range.end {
                            found |=
                                self.unigram_gen_next_step(start, end, &max, token, matrix, model);
                        }
                    }
                }
                found
            }
            Constraint::NoSearch { .. } => false,
        }
    }

    fn unigram_gen_next_step(
        &mut self,
        start: usize,
        end: usize,
        cur_step: &TrellisValue,
        token: Token,
        matrix: &PhoneticKeyMatrix,
        model: &Model,
    ) -> bool {
        let item = match model.phrase_index.get_item(token) {
            Some(item) => item,
            None => return false,
        };

        let total_freq = model.phrase_index.total_freq();
        if total_freq == 0 {
            return false;
        }

        let phrase_length = item.phrase_length();
        let elem_poss = item.unigram_frequency() as f64 / total_freq as f64;
        if elem_poss < f64::EPSILON {
            return false;
        }

        let pinyin_poss = compute_pronunciation_possibility(matrix, start, end, item);
        if pinyin_poss < f32::EPSILON {
            return false;
        }

        let mut next_step = TrellisValue::new(
            cur_step.poss
                + (elem_poss * pinyin_poss as f64 * self.unigram_lambda as f64).ln() as f32,
        );
        next_step.prev_token = cur_step.cur_token;
        next_step.cur_token = token;
        next_step.sentence_length = cur_step.sentence_length + phrase_length as i32;
        next_step.last_step = start as i32;
        next_step.sub_index = cur_step.current_index;

        self.trellis.insert_candidate(end, token, &next_step)
    }

    #[allow(clippy::too_many_arguments)]
    fn bigram_gen_next_step(
        &mut self,
        start: usize,
        end: usize,
        cur_step: &TrellisValue,
        token: Token,
        bigram_poss: f32,
        matrix: &PhoneticKeyMatrix,
        model: &Model,
    ) -> bool {
        let item = match model.phrase_index.get_item(token) {
            Some(item) => item,
            None => return false,
        };

        let total_freq = model.phrase_index.total_freq();
        if total_freq == 0 {
            return false;
        }

        let phrase_length = item.phrase_length();
        let unigram_poss = item.unigram_frequency() as f64 / total_freq as f64;
        if bigram_poss < f32::EPSILON && unigram_poss < f64::EPSILON {
            return false;
        }

        let pinyin_poss = compute_pronunciation_possibility(matrix, start, end, item);
        if pinyin_poss < f32::EPSILON {
            return false;
        }

        let interpolated =
            self.bigram_lambda * bigram_poss + self.unigram_lambda * unigram_poss as f32;
        let mut next_step = TrellisValue::new(cur_step.poss + (interpolated * pinyin_poss).ln());
        next_step.prev_token = cur_step.cur_token;
        next_step.cur_token = token;
        next_step.sentence_length = cur_step.sentence_length + phrase_length as i32;
        next_step.last_step = start as i32;
        next_step.sub_index = cur_step.current_index;

        self.trellis.insert_candidate(end, token, &next_step)
    }

    /// Back-propagate a committed sentence.
    ///
    /// Every word of the result reinforces, in order: the user bigram
    /// `last_token → token` (with a seed that ramps with the existing count
    /// and a guard against wrapping the total), the pronunciation the word
    /// realized over its span, and the word's unigram frequency.
    pub fn train_result(
        &self,
        matrix: &PhoneticKeyMatrix,
        constraints: &ForwardPhoneticConstraints,
        result: &MatchResult,
        model: &mut Model,
    ) -> anyhow::Result<()> {
        const INITIAL_SEED: u32 = 23 * 3;
        const EXPAND_FACTOR: u32 = 2;
        const UNIGRAM_FACTOR: u32 = 7;
        const PINYIN_FACTOR: u32 = 1;
        const CEILING_SEED: u32 = 23 * 15 * 64;

        let mut last_token = SENTENCE_START;

        for i in 0..result.len() {
            let token = result[i];
            if token == NULL_TOKEN {
                continue;
            }

            if let Constraint::OneStep { token: pinned, .. } = constraints.get(i) {
                debug_assert_eq!(token, pinned);
            }

            let mut seed = INITIAL_SEED;

            // bigram first; the reached count sets the seed for the rest
            if last_token != NULL_TOKEN {
                let mut user = model.user_bigram.load(last_token).unwrap_or_default();

                let total_freq = user.get_total_freq();
                let freq = match user.get_freq(token) {
                    Some(freq) => {
                        seed = freq
                            .max(INITIAL_SEED)
                            .saturating_mul(EXPAND_FACTOR)
                            .min(CEILING_SEED);
                        freq
                    }
                    None => {
                        user.insert_freq(token, 0);
                        0
                    }
                };

                // skip the write rather than wrap the total
                if total_freq.checked_add(seed).is_some() {
                    user.set_total_freq(total_freq + seed);
                    user.set_freq(token, freq + seed);
                    model.user_bigram.store(last_token, &user)?;
                }
            }

            // span of this word: up to the next emitted token (or the tail)
            let next_pos = (i + 1..result.len())
                .find(|&pos| result[pos] != NULL_TOKEN)
                .unwrap_or(result.len())
                .min(result.len() - 1);

            if let Some(item) = model.phrase_index.get_item_mut(token) {
                increase_pronunciation_possibility(
                    matrix,
                    i,
                    next_pos,
                    item,
                    seed * PINYIN_FACTOR,
                );
            }
            model.phrase_index.add_unigram_frequency(token, seed * UNIGRAM_FACTOR);

            last_token = token;
        }

        Ok(())
    }
}

/// Join the phrase strings of a result into the committed sentence.
/// Unknown tokens are skipped.
pub fn convert_to_string(phrase_index: &PhraseIndex, result: &MatchResult) -> String {
    let mut out = String::new();
    for &token in result {
        if token == NULL_TOKEN {
            continue;
        }
        if let Some(item) = phrase_index.get_item(token) {
            out.push_str(item.phrase_string());
        }
    }
    out
}
