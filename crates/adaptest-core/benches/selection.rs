use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use adaptest_core::engine::{AdaptiveEngine, DifficultyPolicy};
use adaptest_core::model::{DifficultyTier, Question};
use adaptest_core::traits::{Evaluation, Submission};
use adaptest_core::QuestionBank;

fn make_bank(size: usize) -> Arc<QuestionBank> {
    let questions = (0..size)
        .map(|i| Question {
            id: format!("q{i}"),
            prompt: format!("Question {i}"),
            reference_answer: "reference".into(),
            tier: DifficultyTier((i % 5) as u8 + 1),
            topic: None,
            keywords: vec![],
        })
        .collect();
    Arc::new(QuestionBank::new("bench", "Bench", questions).unwrap())
}

fn full_run(engine: &AdaptiveEngine, scores: &[f64]) -> usize {
    let submission = Submission {
        answer: "answer".into(),
        explanation: None,
    };
    let mut session = engine.new_session();
    let mut current = engine.begin(&mut session).unwrap();
    for score in scores.iter().cycle() {
        let evaluation = Evaluation {
            score: *score,
            feedback: String::new(),
            misconception: None,
            explanation_score: None,
        };
        match engine
            .record_answer_and_select_next(&mut session, current, &submission, &evaluation)
            .unwrap()
        {
            adaptest_core::Selection::Next(q) => current = q,
            adaptest_core::Selection::Exhausted => break,
        }
    }
    session.served_count()
}

fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_run");

    for size in [15, 150, 1500] {
        let engine = AdaptiveEngine::new(make_bank(size), DifficultyPolicy::default(), 15);
        group.bench_function(format!("bank={size},alternating"), |b| {
            b.iter(|| full_run(black_box(&engine), black_box(&[0.9, 0.1])))
        });
    }

    let engine = AdaptiveEngine::new(make_bank(1500), DifficultyPolicy::default(), 15);
    group.bench_function("bank=1500,climbing", |b| {
        b.iter(|| full_run(black_box(&engine), black_box(&[1.0])))
    });

    group.finish();
}

fn bench_first_question(c: &mut Criterion) {
    let engine = AdaptiveEngine::new(make_bank(1500), DifficultyPolicy::default(), 15);
    c.bench_function("select_first_question", |b| {
        b.iter(|| black_box(&engine).select_first_question().unwrap().id.len())
    });
}

criterion_group!(benches, bench_full_run, bench_first_question);
criterion_main!(benches);
