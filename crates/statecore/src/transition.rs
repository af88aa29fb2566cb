use crate::{AnyValue, ContractError, EngineError, NodeId, StateData, StateNode, TypeDescriptor};
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&AnyValue) -> Result<bool, String> + Send + Sync>;
type Converter = Arc<dyn Fn(&AnyValue) -> Result<AnyValue, String> + Send + Sync>;

/// Conditional, optionally converting link from one node's output to the
/// next node's input. The source node owns its transitions.
#[derive(Clone)]
pub struct Transition {
    source: NodeId,
    source_name: String,
    target: NodeId,
    output_type: TypeDescriptor,
    input_type: TypeDescriptor,
    label: Option<String>,
    predicate: Predicate,
    converter: Option<Converter>,
}

impl Transition {
    /// Non-converting transition. `from`'s output type must equal `to`'s
    /// input type, and the predicate must be written against that type.
    pub fn new<O, P>(from: &StateNode, to: &StateNode, predicate: P) -> Result<Self, ContractError>
    where
        O: StateData,
        P: Fn(&O) -> bool + Send + Sync + 'static,
    {
        check_predicate_type::<O>(from, to)?;
        if !to.input_type().accepts(&from.output_type()) {
            return Err(incompatible(
                from,
                to,
                format!(
                    "{} output cannot feed {} input without a converter",
                    from.output_type(),
                    to.input_type()
                ),
            ));
        }
        Ok(Self::build(from, to, typed_predicate(predicate), None))
    }

    /// Unconditional non-converting transition.
    pub fn always(from: &StateNode, to: &StateNode) -> Result<Self, ContractError> {
        if !to.input_type().accepts(&from.output_type()) {
            return Err(incompatible(
                from,
                to,
                format!(
                    "{} output cannot feed {} input without a converter",
                    from.output_type(),
                    to.input_type()
                ),
            ));
        }
        Ok(Self::build(from, to, Arc::new(|_: &AnyValue| Ok::<bool, String>(true)), None))
    }

    /// Converting transition: the converter runs only after the predicate holds.
    pub fn converting<O, N, P, C>(
        from: &StateNode,
        to: &StateNode,
        predicate: P,
        converter: C,
    ) -> Result<Self, ContractError>
    where
        O: StateData,
        N: StateData,
        P: Fn(&O) -> bool + Send + Sync + 'static,
        C: Fn(&O) -> N + Send + Sync + 'static,
    {
        check_predicate_type::<O>(from, to)?;
        let converted = TypeDescriptor::of::<N>();
        if !to.input_type().accepts(&converted) {
            return Err(incompatible(
                from,
                to,
                format!("converter yields {}, target accepts {}", converted, to.input_type()),
            ));
        }
        let converter: Converter = Arc::new(move |value: &AnyValue| {
            value
                .downcast_ref::<O>()
                .map(|v| AnyValue::new(converter(v)))
                .ok_or_else(|| mismatch::<O>(value))
        });
        Ok(Self::build(from, to, typed_predicate(predicate), Some(converter)))
    }

    fn build(from: &StateNode, to: &StateNode, predicate: Predicate, converter: Option<Converter>) -> Self {
        Self {
            source: from.id(),
            source_name: from.name().to_string(),
            target: to.id(),
            output_type: from.output_type(),
            input_type: to.input_type(),
            label: None,
            predicate,
            converter,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Some(label.into());
        self
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn output_type(&self) -> TypeDescriptor {
        self.output_type
    }

    pub fn input_type(&self) -> TypeDescriptor {
        self.input_type
    }

    pub fn is_converting(&self) -> bool {
        self.converter.is_some()
    }

    /// Run the predicate against one output.
    pub fn evaluate(&self, output: &AnyValue) -> Result<bool, EngineError> {
        (self.predicate)(output).map_err(|reason| self.failure(reason))
    }

    /// Start one firing of this transition against `output`.
    pub fn fire<'t>(&'t self, output: &'t AnyValue) -> Firing<'t> {
        Firing {
            transition: self,
            output,
            fired: None,
            converted: None,
        }
    }

    fn failure(&self, reason: String) -> EngineError {
        EngineError::Transition {
            node: self.source_name.clone(),
            target: self.target,
            reason,
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("label", &self.label)
            .field("converting", &self.is_converting())
            .finish()
    }
}

/// One evaluation of a transition against one output.
///
/// The converted value is computed at most once, and only after the predicate
/// has held.
pub struct Firing<'t> {
    transition: &'t Transition,
    output: &'t AnyValue,
    fired: Option<bool>,
    converted: Option<AnyValue>,
}

impl<'t> Firing<'t> {
    pub fn evaluate(&mut self) -> Result<bool, EngineError> {
        if let Some(fired) = self.fired {
            return Ok(fired);
        }
        let fired = self.transition.evaluate(self.output)?;
        self.fired = Some(fired);
        Ok(fired)
    }

    pub fn has_fired(&self) -> bool {
        self.fired == Some(true)
    }

    /// The value handed to the target node.
    pub fn next_input(&mut self) -> Result<AnyValue, EngineError> {
        if !self.has_fired() {
            return Err(EngineError::ConversionNotFired {
                target: self.transition.target,
            });
        }
        let Some(converter) = self.transition.converter.as_ref() else {
            return Ok(self.output.clone());
        };
        if let Some(converted) = &self.converted {
            return Ok(converted.clone());
        }
        let converted = converter(self.output).map_err(|reason| self.transition.failure(reason))?;
        self.converted = Some(converted.clone());
        Ok(converted)
    }

    /// Cached converter result.
    pub fn converted(&self) -> Result<&AnyValue, EngineError> {
        if self.transition.converter.is_none() {
            return Err(EngineError::MissingConverter {
                target: self.transition.target,
            });
        }
        self.converted.as_ref().ok_or(EngineError::ConversionNotFired {
            target: self.transition.target,
        })
    }
}

fn typed_predicate<O, P>(predicate: P) -> Predicate
where
    O: StateData,
    P: Fn(&O) -> bool + Send + Sync + 'static,
{
    Arc::new(move |value: &AnyValue| {
        value
            .downcast_ref::<O>()
            .map(|v| predicate(v))
            .ok_or_else(|| mismatch::<O>(value))
    })
}

fn check_predicate_type<O: StateData>(from: &StateNode, to: &StateNode) -> Result<(), ContractError> {
    let declared = TypeDescriptor::of::<O>();
    if from.output_type().accepts(&declared) {
        Ok(())
    } else {
        Err(incompatible(
            from,
            to,
            format!("predicate expects {}, source produces {}", declared, from.output_type()),
        ))
    }
}

fn incompatible(from: &StateNode, to: &StateNode, reason: String) -> ContractError {
    ContractError::IncompatibleTransition {
        from: from.name().to_string(),
        to: to.name().to_string(),
        reason,
    }
}

fn mismatch<O: StateData>(value: &AnyValue) -> String {
    format!(
        "expected {}, got {}",
        TypeDescriptor::of::<O>(),
        value.type_descriptor()
    )
}
