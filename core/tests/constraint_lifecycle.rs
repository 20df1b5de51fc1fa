// Constraint lifecycle against a live matrix: pin, clear, validate, and
// diff-driven pinning feeding back into decodes.

use libphonetic_core::{
    fill_matrix, make_token, Bigram, Config, Constraint, Final, ForwardPhoneticConstraints,
    Initial, KeyRest, Middle, Model, PhoneticIndex, PhoneticKeyMatrix, PhoneticLookup,
    PhraseIndex, PhraseItem, SyllableKey, MatchResult, NULL_TOKEN, SENTENCE_START,
};

fn ni() -> SyllableKey {
    SyllableKey::toneless(Initial::N, Middle::I, Final::Zero)
}

fn hao() -> SyllableKey {
    SyllableKey::toneless(Initial::H, Middle::Zero, Final::Ao)
}

fn build_model() -> (Model, u32, u32, u32) {
    let t_ni = make_token(1, 1);
    let t_alt = make_token(1, 2);
    let t_hao = make_token(1, 3);

    let mut phonetic_index = PhoneticIndex::new();
    phonetic_index.insert(&[ni()], t_ni);
    phonetic_index.insert(&[ni()], t_alt);
    phonetic_index.insert(&[hao()], t_hao);

    let mut phrase_index = PhraseIndex::new();
    phrase_index.add_item(t_ni, PhraseItem::new("你", 100, vec![ni()]));
    phrase_index.add_item(t_alt, PhraseItem::new("尼", 300, vec![ni()]));
    phrase_index.add_item(t_hao, PhraseItem::new("好", 100, vec![hao()]));

    let model = Model::new(phonetic_index, phrase_index, Bigram::new(), Bigram::new());
    (model, t_ni, t_alt, t_hao)
}

fn nihao_matrix() -> PhoneticKeyMatrix {
    let mut matrix = PhoneticKeyMatrix::new();
    fill_matrix(
        &mut matrix,
        &[ni(), hao()],
        &[KeyRest::new(0, 1), KeyRest::new(1, 2)],
    );
    matrix
}

#[test]
fn add_then_clear_restores_no_constraint() {
    let (model, t_ni, _, _) = build_model();
    let matrix = nihao_matrix();

    let mut constraints = ForwardPhoneticConstraints::new();
    constraints.validate(&matrix, &model.phrase_index);

    assert_eq!(constraints.add_constraint(0, 2, t_ni), 2);
    assert!(constraints.clear_constraint(1));

    constraints.validate(&matrix, &model.phrase_index);
    for index in 0..2 {
        assert_eq!(constraints.get(index), Constraint::NoConstraint);
    }
}

#[test]
fn pinned_word_overrides_the_better_scored_reading() {
    let (model, t_ni, t_alt, t_hao) = build_model();
    let matrix = nihao_matrix();

    let mut constraints = ForwardPhoneticConstraints::new();
    constraints.validate(&matrix, &model.phrase_index);

    let mut lookup = PhoneticLookup::from_config(&Config::default());

    // unconstrained, the stronger unigram reading wins
    let results = lookup.get_nbest_match(&[SENTENCE_START], &matrix, &constraints, &model);
    assert_eq!(results.get(0).unwrap()[0], t_alt);

    constraints.add_constraint(0, 1, t_ni);
    let results = lookup.get_nbest_match(&[SENTENCE_START], &matrix, &constraints, &model);
    let best = results.get(0).unwrap();
    assert_eq!(best[0], t_ni);
    assert_eq!(best[1], t_hao);
}

#[test]
fn diff_result_pins_the_chosen_words() {
    let (model, t_ni, t_alt, t_hao) = build_model();
    let matrix = nihao_matrix();

    let mut constraints = ForwardPhoneticConstraints::new();
    constraints.validate(&matrix, &model.phrase_index);

    let best: MatchResult = vec![t_alt, t_hao, NULL_TOKEN];
    let other: MatchResult = vec![t_ni, t_hao, NULL_TOKEN];

    assert!(constraints.diff_result(&best, &other));
    assert_eq!(constraints.get(0), Constraint::OneStep { token: t_ni, end: 1 });
    // the agreeing word is left free
    assert_eq!(constraints.get(1), Constraint::NoConstraint);

    // the pin survives validation and steers the decode
    constraints.validate(&matrix, &model.phrase_index);
    let mut lookup = PhoneticLookup::from_config(&Config::default());
    let results = lookup.get_nbest_match(&[SENTENCE_START], &matrix, &constraints, &model);
    assert_eq!(results.get(0).unwrap()[0], t_ni);
}

#[test]
fn validate_drops_pins_after_matrix_edit() {
    let (model, _t_ni, t_alt, t_hao) = build_model();
    let matrix = nihao_matrix();

    let mut constraints = ForwardPhoneticConstraints::new();
    constraints.validate(&matrix, &model.phrase_index);
    constraints.add_constraint(1, 2, t_hao);

    // the user deletes "hao"; the matrix shrinks under the pin
    let mut edited = PhoneticKeyMatrix::new();
    fill_matrix(&mut edited, &[ni()], &[KeyRest::new(0, 1)]);

    constraints.validate(&edited, &model.phrase_index);
    assert_eq!(constraints.len(), edited.size());
    assert_eq!(constraints.get(1), Constraint::NoConstraint);

    // decoding with the shrunk matrix still works, back on the free
    // best reading
    let mut lookup = PhoneticLookup::from_config(&Config::default());
    let results = lookup.get_nbest_match(&[SENTENCE_START], &edited, &constraints, &model);
    assert!(!results.is_empty());
    assert_eq!(results.get(0).unwrap()[0], t_alt);
}
