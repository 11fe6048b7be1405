mod common;

use common::{context, split, ChannelOracle, B};
use models::ModelPreset;
use training::{evaluate, report, DistillationLoss, TrainingError};

#[test]
fn oracle_scores_perfectly_with_diagonal_confusion() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let ctx = context(tmp.path());
    let data = split(&[2, 3, 1], 4);
    let outcome = evaluate::<B, _>(
        &ChannelOracle,
        &data,
        &DistillationLoss::default(),
        None,
        &ctx,
    )?;
    assert_eq!(outcome.accuracy, 1.0);
    assert!(outcome.confusion.is_diagonal());
    assert_eq!(
        outcome.confusion.rows(),
        vec![vec![2, 0, 0], vec![0, 3, 0], vec![0, 0, 1]]
    );
    assert_eq!(outcome.labels, data.labels());
    assert_eq!(outcome.predictions, outcome.labels);
    assert!(outcome.mean_loss.is_finite() && outcome.mean_loss > 0.0);
    Ok(())
}

#[test]
fn mean_loss_is_invariant_to_batch_size() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let ctx = context(tmp.path());
    let model = ModelPreset::Compact.build::<B>(3, &ctx.device);
    let loss_fn = DistillationLoss::new(2.0, 0.5)?;

    let mut results = Vec::new();
    for batch_size in [1, 4, 5, 64] {
        let data = split(&[4, 3, 4], 32).with_batch_size(batch_size);
        results.push(evaluate::<B, _>(
            &model,
            &data,
            &loss_fn,
            Some(&ChannelOracle),
            &ctx,
        )?);
    }
    let reference = &results[0];
    for other in &results[1..] {
        assert!(
            (other.mean_loss - reference.mean_loss).abs() <= 1e-5 * reference.mean_loss.max(1.0),
            "{} vs {}",
            other.mean_loss,
            reference.mean_loss
        );
        assert_eq!(other.accuracy, reference.accuracy);
        assert_eq!(other.predictions, reference.predictions);
    }
    Ok(())
}

#[test]
fn missing_teacher_leaves_only_the_hard_term() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let ctx = context(tmp.path());
    let model = ModelPreset::Compact.build::<B>(3, &ctx.device);
    let data = split(&[3, 3, 3], 4);

    let hard_only = evaluate::<B, _>(&model, &data, &DistillationLoss::new(2.0, 0.0)?, None, &ctx)?;
    let blended = evaluate::<B, _>(&model, &data, &DistillationLoss::new(2.0, 0.5)?, None, &ctx)?;
    assert!((blended.mean_loss - 0.5 * hard_only.mean_loss).abs() < 1e-5);
    Ok(())
}

#[test]
fn empty_split_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let ctx = context(tmp.path());
    let empty = split(&[], 4);
    let err = evaluate::<B, _>(&ChannelOracle, &empty, &DistillationLoss::default(), None, &ctx)
        .unwrap_err();
    assert!(matches!(err, TrainingError::EmptySplit));
    Ok(())
}

#[test]
fn report_names_classes_and_weights_scores() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let ctx = context(tmp.path());
    let data = split(&[2, 3, 1], 32);
    let test_report = report::<B, _>(&ChannelOracle, &data, &DistillationLoss::default(), &ctx)?;

    assert_eq!(test_report.accuracy, 1.0);
    assert!((test_report.f1 - 1.0).abs() < 1e-6);
    assert!((test_report.precision - 1.0).abs() < 1e-6);
    assert!((test_report.recall - 1.0).abs() < 1e-6);
    let names: Vec<&str> = test_report.per_class.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["angry", "happy", "sad"]);
    assert_eq!(test_report.per_class[1].metrics.support, 3);

    let rendered = test_report.to_string();
    assert!(rendered.contains("F1 Score: 1.0000"));
    assert!(rendered.contains("happy"));
    Ok(())
}
