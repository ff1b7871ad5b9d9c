//! Training loop controller: epochs, early stopping, checkpointing,
//! learning-rate scheduling.
//!
//! One epoch moves through an explicit phase machine:
//!
//! ```text
//! Training -> Validating -> CheckingImprovement -> Training
//!                                              \-> Stopped
//! ```
//!
//! Each training step runs forward, weighted cross-entropy, backward,
//! global-norm gradient clipping, and one Adam step. Validation runs
//! forward-only in eval mode. Whenever validation F1 strictly exceeds the
//! best seen, the model is checkpointed; `patience` non-improving epochs
//! in a row stop the run, as does exhausting the epoch budget. At stop,
//! the best checkpoint is loaded back into the model so the caller
//! receives the best-validation weights, not the last-epoch weights.

use std::path::PathBuf;

use crate::dataset::BatchLoader;
use crate::error::{CentinelaError, Result};
use crate::graph::GraphCollection;
use crate::metrics::EpochMetrics;
use crate::model::GcnLstmClassifier;
use crate::nn::serialize::{load_model, save_model};
use crate::nn::{
    clip_grad_norm, predictions, Adam, Module, Optimizer, PlateauMode, ReduceLROnPlateau,
    WeightedCrossEntropy,
};

/// Hyperparameters for a training run.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Epoch budget (the run never exceeds this many epochs)
    pub max_epochs: usize,
    /// Non-improving epochs tolerated before early stop
    pub patience: usize,
    /// Initial Adam learning rate
    pub learning_rate: f32,
    /// Mini-batch size
    pub batch_size: usize,
    /// Global gradient-norm ceiling
    pub max_grad_norm: f32,
    /// Learning-rate reduction factor on plateau
    pub scheduler_factor: f32,
    /// Plateau patience for the scheduler (keyed on validation loss)
    pub scheduler_patience: usize,
    /// Where the best-model checkpoint is written
    pub checkpoint_path: PathBuf,
    /// Seed for the training loader's shuffling
    pub shuffle_seed: u64,
}

impl TrainerConfig {
    /// Defaults matching the reference run: 49 epochs, patience 10,
    /// lr 1e-3, batch 32, clip 1.0, plateau factor 0.1 / patience 10.
    #[must_use]
    pub fn new(checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            max_epochs: 49,
            patience: 10,
            learning_rate: 1e-3,
            batch_size: 32,
            max_grad_norm: 1.0,
            scheduler_factor: 0.1,
            scheduler_patience: 10,
            checkpoint_path: checkpoint_path.into(),
            shuffle_seed: 42,
        }
    }

    /// Set the epoch budget.
    #[must_use]
    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    /// Set the early-stopping patience.
    #[must_use]
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Set the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the training loader's shuffle seed.
    #[must_use]
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_epochs == 0 {
            return Err(CentinelaError::invalid_hyperparameter(
                "max_epochs",
                self.max_epochs,
                ">= 1",
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(CentinelaError::invalid_hyperparameter(
                "learning_rate",
                self.learning_rate,
                "> 0",
            ));
        }
        if self.batch_size == 0 {
            return Err(CentinelaError::invalid_hyperparameter(
                "batch_size",
                self.batch_size,
                ">= 1",
            ));
        }
        if self.max_grad_norm <= 0.0 {
            return Err(CentinelaError::invalid_hyperparameter(
                "max_grad_norm",
                self.max_grad_norm,
                "> 0",
            ));
        }
        Ok(())
    }
}

/// Mutable run state, owned by the trainer and updated at epoch
/// boundaries only.
#[derive(Debug, Clone, Default)]
pub struct TrainingState {
    /// Last completed epoch (1-based)
    pub epoch: usize,
    /// Best validation F1 observed so far
    pub best_val_f1: f32,
    /// Consecutive epochs without improvement
    pub epochs_without_improvement: usize,
    /// Mean training loss per epoch
    pub train_loss_history: Vec<f32>,
    /// Mean validation loss per epoch
    pub val_loss_history: Vec<f32>,
    /// Training accuracy per epoch
    pub train_accuracy_history: Vec<f32>,
    /// Validation accuracy per epoch
    pub val_accuracy_history: Vec<f32>,
}

impl TrainingState {
    /// Record an epoch's validation F1. Returns true when it strictly
    /// improves on the best seen (which resets the patience counter).
    pub fn observe_f1(&mut self, val_f1: f32) -> bool {
        if val_f1 > self.best_val_f1 {
            self.best_val_f1 = val_f1;
            self.epochs_without_improvement = 0;
            true
        } else {
            self.epochs_without_improvement += 1;
            false
        }
    }

    /// Whether the patience budget is exhausted.
    #[must_use]
    pub fn should_stop(&self, patience: usize) -> bool {
        self.epochs_without_improvement >= patience
    }
}

/// Phase of the per-epoch state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Training,
    Validating,
    CheckingImprovement,
    Stopped,
}

/// Why the run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `patience` consecutive epochs without validation-F1 improvement
    PatienceExhausted,
    /// The epoch budget ran out
    EpochBudgetExhausted,
}

/// One epoch's observable record.
#[derive(Debug, Clone)]
pub struct EpochRecord {
    /// Epoch index (1-based)
    pub epoch: usize,
    /// Mean training loss
    pub train_loss: f32,
    /// Training-pass metrics
    pub train_metrics: EpochMetrics,
    /// Mean validation loss
    pub val_loss: f32,
    /// Validation-pass metrics
    pub val_metrics: EpochMetrics,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct TrainingSummary {
    /// Why training stopped
    pub stop_reason: StopReason,
    /// Final run state
    pub state: TrainingState,
    /// Per-epoch records in order
    pub records: Vec<EpochRecord>,
    /// Whether a checkpoint was ever written (some epoch improved)
    pub checkpoint_written: bool,
}

/// Orchestrates the whole training run.
pub struct Trainer {
    config: TrainerConfig,
    optimizer: Adam,
    scheduler: ReduceLROnPlateau,
}

impl Trainer {
    /// Create a trainer from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CentinelaError::InvalidHyperparameter`] on a bad config.
    pub fn new(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        let optimizer = Adam::new(config.learning_rate);
        let scheduler = ReduceLROnPlateau::new(
            PlateauMode::Min,
            config.scheduler_factor,
            config.scheduler_patience,
        );
        Ok(Self {
            config,
            optimizer,
            scheduler,
        })
    }

    /// Run the full training loop.
    ///
    /// # Errors
    ///
    /// Propagates checkpoint I/O failures and aborts with
    /// [`CentinelaError::NumericalInstability`] on a non-finite loss; no
    /// partial-epoch recovery is attempted.
    pub fn fit(
        &mut self,
        model: &mut GcnLstmClassifier,
        loss_fn: &WeightedCrossEntropy,
        train: &GraphCollection,
        val: &GraphCollection,
    ) -> Result<TrainingSummary> {
        let mut train_loader =
            BatchLoader::new(self.config.batch_size).with_shuffle(self.config.shuffle_seed);
        let mut val_loader = BatchLoader::new(self.config.batch_size);

        let mut state = TrainingState::default();
        let mut records = Vec::new();
        let mut checkpoint_written = false;
        let mut stop_reason = StopReason::EpochBudgetExhausted;

        let mut phase = Phase::Training;
        let mut epoch = 0usize;
        let mut train_result: Option<(f32, EpochMetrics)> = None;
        let mut val_result: Option<(f32, EpochMetrics)> = None;

        while phase != Phase::Stopped {
            match phase {
                Phase::Training => {
                    epoch += 1;
                    model.train();

                    let mut total_loss = 0.0f32;
                    let mut num_batches = 0usize;
                    let mut all_preds = Vec::new();
                    let mut all_labels = Vec::new();

                    for batch in train_loader.iter(train) {
                        model.zero_grad();
                        let logits = model.forward(&batch);
                        let (loss, grad) = loss_fn.loss_and_grad(&logits, &batch.labels);
                        if !loss.is_finite() {
                            return Err(CentinelaError::NumericalInstability {
                                epoch,
                                loss: f64::from(loss),
                            });
                        }
                        model.backward(&grad);

                        let mut params = model.parameters_mut();
                        clip_grad_norm(&mut params, self.config.max_grad_norm);
                        self.optimizer.step(&mut params);

                        total_loss += loss;
                        num_batches += 1;
                        all_preds.extend(predictions(&logits));
                        all_labels.extend_from_slice(&batch.labels);
                    }

                    let mean_loss = total_loss / num_batches.max(1) as f32;
                    let metrics = EpochMetrics::from_predictions(&all_labels, &all_preds);
                    train_result = Some((mean_loss, metrics));
                    phase = Phase::Validating;
                }

                Phase::Validating => {
                    let (loss, metrics) = evaluate(model, loss_fn, val, &mut val_loader);
                    if !loss.is_finite() {
                        return Err(CentinelaError::NumericalInstability {
                            epoch,
                            loss: f64::from(loss),
                        });
                    }
                    val_result = Some((loss, metrics));
                    phase = Phase::CheckingImprovement;
                }

                Phase::CheckingImprovement => {
                    let (train_loss, train_metrics) =
                        train_result.take().expect("training phase ran");
                    let (val_loss, val_metrics) = val_result.take().expect("validation phase ran");

                    state.epoch = epoch;
                    state.train_loss_history.push(train_loss);
                    state.val_loss_history.push(val_loss);
                    state.train_accuracy_history.push(train_metrics.accuracy);
                    state.val_accuracy_history.push(val_metrics.accuracy);

                    println!(
                        "Epoch {epoch:02} | Train Loss: {train_loss:.4} | Train Acc: {:.2} | \
                         Val Loss: {val_loss:.4} | Val Acc: {:.2} | Train F1: {:.2} | Val F1: {:.2}",
                        train_metrics.accuracy,
                        val_metrics.accuracy,
                        train_metrics.f1,
                        val_metrics.f1
                    );

                    records.push(EpochRecord {
                        epoch,
                        train_loss,
                        train_metrics,
                        val_loss,
                        val_metrics,
                    });

                    if state.observe_f1(val_metrics.f1) {
                        save_model(&*model, &self.config.checkpoint_path)?;
                        checkpoint_written = true;
                    }

                    if state.should_stop(self.config.patience) {
                        println!("Early stopping at epoch {epoch}");
                        stop_reason = StopReason::PatienceExhausted;
                        phase = Phase::Stopped;
                    } else if epoch >= self.config.max_epochs {
                        stop_reason = StopReason::EpochBudgetExhausted;
                        phase = Phase::Stopped;
                    } else {
                        self.scheduler.step_with_metric(&mut self.optimizer, val_loss);
                        phase = Phase::Training;
                    }
                }

                Phase::Stopped => unreachable!("loop exits at Stopped"),
            }
        }

        // Hand back the best-validation weights, not the last-epoch ones.
        if checkpoint_written {
            load_model(model, &self.config.checkpoint_path)?;
        }

        Ok(TrainingSummary {
            stop_reason,
            state,
            records,
            checkpoint_written,
        })
    }

    /// Current learning rate (changes when the scheduler fires).
    #[must_use]
    pub fn learning_rate(&self) -> f32 {
        self.optimizer.lr()
    }
}

/// Forward-only pass over a collection in eval mode; returns mean loss
/// and metrics. Used for the per-epoch validation pass and for final
/// test-time evaluation.
pub fn evaluate(
    model: &mut GcnLstmClassifier,
    loss_fn: &WeightedCrossEntropy,
    collection: &GraphCollection,
    loader: &mut BatchLoader,
) -> (f32, EpochMetrics) {
    let was_training = model.training();
    model.eval();

    let mut total_loss = 0.0f32;
    let mut num_batches = 0usize;
    let mut all_preds = Vec::new();
    let mut all_labels = Vec::new();

    for batch in loader.iter(collection) {
        let logits = model.forward(&batch);
        let (loss, _) = loss_fn.loss_and_grad(&logits, &batch.labels);
        total_loss += loss;
        num_batches += 1;
        all_preds.extend(predictions(&logits));
        all_labels.extend_from_slice(&batch.labels);
    }

    if was_training {
        model.train();
    }

    let mean_loss = total_loss / num_batches.max(1) as f32;
    (mean_loss, EpochMetrics::from_predictions(&all_labels, &all_preds))
}
