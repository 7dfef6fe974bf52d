//! Interface and wrappers for the function approximators used by the
//! trainers.
//!
//! A trainer sees a network through a role wrapper ([`Model1`] or
//! [`Model2`]) that owns the parameter store ([`VarMap`]), the submodel
//! built on it and the optimizer over its variables. Snapshot copies
//! (`old_policy`, target networks) are taken with [`Model1::clone`], which
//! builds a fresh parameter store and copies values over; live and frozen
//! parameters never alias.
use crate::{
    opt::{Optimizer, OptimizerConfig},
    util::{copy_params, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Neural network model not owning its [`VarMap`] internally.
pub trait SubModel1 {
    /// Configuration from which the model is constructed.
    type Config;

    /// Input of the model.
    type Input;

    /// Output of the model.
    type Output;

    /// Builds the model with [`VarBuilder`] and its configuration.
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// A generalized forward function.
    fn forward(&self, input: &Self::Input) -> Self::Output;
}

/// Neural network model not owning its [`VarMap`] internally.
///
/// The difference from [`SubModel1`] is that this trait takes two inputs,
/// e.g. an observation and an action for a Q-function.
pub trait SubModel2 {
    /// Configuration from which the model is constructed.
    type Config;

    /// First input of the model.
    type Input1;

    /// Second input of the model.
    type Input2;

    /// Output of the model.
    type Output;

    /// Builds the model.
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// A generalized forward function.
    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output;
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of a model role: the network plus its optimizer.
pub struct ModelConfig<C> {
    net_config: Option<C>,
    opt_config: OptimizerConfig,
}

impl<C> Default for ModelConfig<C> {
    fn default() -> Self {
        Self {
            net_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<C> ModelConfig<C>
where
    C: DeserializeOwned + Serialize,
{
    /// Sets the network configuration.
    pub fn net_config(mut self, v: C) -> Self {
        self.net_config = Some(v);
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Overrides the learning rate.
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.opt_config = self.opt_config.learning_rate(lr);
        self
    }

    /// Overrides the network output dimension, typically with the action
    /// length of the environment.
    pub fn out_dim(mut self, v: i64) -> Self
    where
        C: OutDim,
    {
        if let Some(c) = self.net_config.as_mut() {
            c.set_out_dim(v);
        }
        self
    }

    /// Constructs [`ModelConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ModelConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// A single-input network with its parameter store and optimizer.
pub struct Model1<P>
where
    P: SubModel1,
    P::Config: DeserializeOwned + Serialize + Clone,
{
    device: Device,
    varmap: VarMap,
    net_config: P::Config,
    net: P,
    opt_config: OptimizerConfig,
    opt: Optimizer,
}

impl<P> Model1<P>
where
    P: SubModel1,
    P::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs the model on the given device.
    pub fn build(config: ModelConfig<P::Config>, device: Device) -> Result<Self> {
        let net_config = config.net_config.context("net_config is not set.")?;
        let opt_config = config.opt_config;
        let varmap = VarMap::new();
        let net = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            P::build(vb, net_config.clone())
        };
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            net_config,
            net,
            opt_config,
            opt,
        })
    }

    /// Performs forward computation.
    pub fn forward(&self, x: &P::Input) -> P::Output {
        self.net.forward(x)
    }

    /// Computes gradients of `loss` and applies one optimization step.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// The parameter store of this model.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Device the model lives on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Saves the parameters as safetensors.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save model to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads parameters saved with [`Model1::save`].
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load model from {:?}", path.as_ref());
        Ok(())
    }
}

impl<P> Clone for Model1<P>
where
    P: SubModel1,
    P::Config: DeserializeOwned + Serialize + Clone,
{
    /// Deep copy: a fresh parameter store with the current values.
    fn clone(&self) -> Self {
        let varmap = VarMap::new();
        let net = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
            P::build(vb, self.net_config.clone())
        };
        let opt = self.opt_config.build(varmap.all_vars()).unwrap();
        copy_params(&varmap, &self.varmap).unwrap();

        Self {
            device: self.device.clone(),
            varmap,
            net_config: self.net_config.clone(),
            net,
            opt_config: self.opt_config.clone(),
            opt,
        }
    }
}

/// A two-input network with its parameter store and optimizer.
pub struct Model2<Q>
where
    Q: SubModel2,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    device: Device,
    varmap: VarMap,
    net_config: Q::Config,
    net: Q,
    opt_config: OptimizerConfig,
    opt: Optimizer,
}

impl<Q> Model2<Q>
where
    Q: SubModel2,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs the model on the given device.
    pub fn build(config: ModelConfig<Q::Config>, device: Device) -> Result<Self> {
        let net_config = config.net_config.context("net_config is not set.")?;
        let opt_config = config.opt_config;
        let varmap = VarMap::new();
        let net = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Q::build(vb, net_config.clone())
        };
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            net_config,
            net,
            opt_config,
            opt,
        })
    }

    /// Performs forward computation.
    pub fn forward(&self, x1: &Q::Input1, x2: &Q::Input2) -> Q::Output {
        self.net.forward(x1, x2)
    }

    /// Computes gradients of `loss` and applies one optimization step.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// The parameter store of this model.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Saves the parameters as safetensors.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save model to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads parameters saved with [`Model2::save`].
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load model from {:?}", path.as_ref());
        Ok(())
    }
}

impl<Q> Clone for Model2<Q>
where
    Q: SubModel2,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    /// Deep copy: a fresh parameter store with the current values.
    fn clone(&self) -> Self {
        let varmap = VarMap::new();
        let net = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
            Q::build(vb, self.net_config.clone())
        };
        let opt = self.opt_config.build(varmap.all_vars()).unwrap();
        copy_params(&varmap, &self.varmap).unwrap();

        Self {
            device: self.device.clone(),
            varmap,
            net_config: self.net_config.clone(),
            net,
            opt_config: self.opt_config.clone(),
            opt,
        }
    }
}
