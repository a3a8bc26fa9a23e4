use crate::error::ConversionError;
use crate::ir::Block;
use crate::ir::BlockArgument;
use crate::ir::Region;
use crate::ir::Type;
use crate::ir::Types;
use crate::ir::Value;
use crate::ir::Values;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;

type Conversion = Box<dyn Fn(&Shared<dyn Type>) -> Result<Option<Shared<dyn Type>>>>;

/// Converts types from the source dialects to the target dialect.
///
/// A conversion callback returns `Ok(Some(..))` with the converted type,
/// `Ok(None)` if it does not handle the type, or an error if the type can
/// never be converted. Callbacks are tried in reverse order of registration,
/// so a later callback can override an earlier one for some types and fall
/// back to it for all others.
#[derive(Default)]
pub struct TypeConverter {
    conversions: Vec<Conversion>,
}

impl TypeConverter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_conversion<F>(&mut self, conversion: F)
    where
        F: Fn(&Shared<dyn Type>) -> Result<Option<Shared<dyn Type>>> + 'static,
    {
        self.conversions.push(Box::new(conversion));
    }
    /// Convert a single type; `Ok(None)` if no callback handles it.
    pub fn convert_type(&self, typ: &Shared<dyn Type>) -> Result<Option<Shared<dyn Type>>> {
        for conversion in self.conversions.iter().rev() {
            if let Some(converted) = conversion(typ)? {
                return Ok(Some(converted));
            }
        }
        Ok(None)
    }
    /// Convert all types or none.
    pub fn convert_types(&self, types: &Types) -> Result<Option<Types>> {
        let mut converted = vec![];
        for typ in types.vec().iter() {
            match self.convert_type(typ)? {
                Some(typ) => converted.push(typ),
                None => return Ok(None),
            }
        }
        Ok(Some(Types::from_vec(converted)))
    }
    /// Convert the signature of a function.
    ///
    /// Each input is converted independently and in order. If any input or
    /// result fails to convert, the whole signature fails.
    pub fn convert_signature(
        &self,
        inputs: &Types,
        results: &Types,
    ) -> Result<Option<SignatureConversion>> {
        let mut conversion = SignatureConversion::new(inputs.len());
        for (index, input) in inputs.vec().iter().enumerate() {
            match self.convert_type(input)? {
                Some(converted) => conversion.add_inputs(index, vec![converted]),
                None => return Ok(None),
            }
        }
        match self.convert_types(results)? {
            Some(results) => conversion.set_result_types(results),
            None => return Ok(None),
        }
        Ok(Some(conversion))
    }
    /// Compute the converted argument types of the blocks in `region`.
    ///
    /// Nothing is changed until [RegionTypeConversion::apply] is called, so a
    /// rewrite can decline if `Ok(None)` is returned. Set `skip_entry` when the
    /// entry block is handled by a [SignatureConversion].
    pub fn convert_region_types(
        &self,
        region: &Shared<Region>,
        skip_entry: bool,
    ) -> Result<Option<RegionTypeConversion>> {
        let skip = if skip_entry { 1 } else { 0 };
        let mut blocks = vec![];
        for block in region.rd().blocks().into_iter().skip(skip) {
            let arguments = block.rd().arguments();
            match self.convert_types(&arguments.types())? {
                Some(types) => blocks.push((arguments, types)),
                None => return Ok(None),
            }
        }
        Ok(Some(RegionTypeConversion { blocks }))
    }
}

/// Where an original input of a function ends up in the converted inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputMapping {
    /// Index of the first converted input.
    pub input_no: usize,
    /// Number of converted inputs; zero if the input was dropped.
    pub size: usize,
}

/// The result of converting a function signature.
///
/// Keeps track of how the original inputs map onto the converted ones, so
/// that operand lists can still be split per original argument.
pub struct SignatureConversion {
    input_mappings: Vec<Option<InputMapping>>,
    converted_inputs: Vec<Shared<dyn Type>>,
    appended_inputs: Vec<Shared<dyn Type>>,
    result_types: Types,
}

impl SignatureConversion {
    pub fn new(num_original_inputs: usize) -> Self {
        SignatureConversion {
            input_mappings: vec![None; num_original_inputs],
            converted_inputs: vec![],
            appended_inputs: vec![],
            result_types: Types::default(),
        }
    }
    /// Map original input `index` onto `types`.
    pub fn add_inputs(&mut self, index: usize, types: Vec<Shared<dyn Type>>) {
        let mapping = InputMapping {
            input_no: self.converted_inputs.len(),
            size: types.len(),
        };
        if let Some(slot) = self.input_mappings.get_mut(index) {
            *slot = Some(mapping);
        }
        self.converted_inputs.extend(types);
    }
    /// Add an input that has no counterpart in the original signature.
    pub fn append_input(&mut self, typ: Shared<dyn Type>) {
        self.appended_inputs.push(typ);
    }
    pub fn input_mapping(&self, index: usize) -> Option<InputMapping> {
        self.input_mappings.get(index).copied().flatten()
    }
    pub fn num_original_inputs(&self) -> usize {
        self.input_mappings.len()
    }
    /// All inputs of the converted signature, appended inputs last.
    pub fn converted_inputs(&self) -> Types {
        let mut inputs = self.converted_inputs.clone();
        inputs.extend(self.appended_inputs.iter().cloned());
        Types::from_vec(inputs)
    }
    pub fn appended_inputs(&self) -> Types {
        Types::from_vec(self.appended_inputs.clone())
    }
    pub fn result_types(&self) -> Types {
        self.result_types.clone()
    }
    pub fn set_result_types(&mut self, result_types: Types) {
        self.result_types = result_types;
    }
}

/// Retype `arguments` according to `conversion` and append the new inputs.
///
/// The argument values are updated in place, so every use of an argument
/// sees the new type. New arguments are named `%argN` and get `parent` as
/// their block.
pub fn apply_signature_conversion(
    arguments: &Values,
    parent: Option<Shared<Block>>,
    conversion: &SignatureConversion,
) -> Result<()> {
    if arguments.len() != conversion.num_original_inputs() {
        return Err(ConversionError::InvalidInput {
            op: "signature".to_string(),
            reason: format!(
                "expected {} arguments, got {}",
                conversion.num_original_inputs(),
                arguments.len()
            ),
        }
        .into());
    }
    let converted = conversion.converted_inputs();
    for index in 0..arguments.len() {
        let mapping = conversion.input_mapping(index);
        let typ = match mapping {
            Some(InputMapping { input_no, size: 1 }) => converted.get(input_no),
            _ => None,
        };
        let (argument, typ) = match (arguments.get(index), typ) {
            (Some(argument), Some(typ)) => (argument, typ),
            _ => {
                return Err(ConversionError::UnsupportedFeature {
                    op: "signature".to_string(),
                    feature: format!("argument {index} does not map onto exactly one input"),
                }
                .into())
            }
        };
        argument.wr().set_type(typ);
    }
    let values = arguments.vec();
    for typ in conversion.appended_inputs().vec() {
        let name = format!("%arg{}", values.rd().len());
        let mut argument = BlockArgument::new(&name, typ);
        argument.set_parent(parent.clone());
        let argument = Shared::new(RwLock::new(Value::BlockArgument(argument)));
        values.wr().push(argument);
    }
    Ok(())
}

/// Pending retyping of block arguments (see
/// [TypeConverter::convert_region_types]).
pub struct RegionTypeConversion {
    blocks: Vec<(Values, Types)>,
}

impl RegionTypeConversion {
    pub fn apply(self) {
        for (arguments, types) in self.blocks {
            for (argument, typ) in arguments.vec().rd().iter().zip(types.vec()) {
                argument.wr().set_type(typ);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::integer_width;
    use crate::ir::FloatType;
    use crate::ir::IntegerType;

    fn converter() -> TypeConverter {
        let mut converter = TypeConverter::new();
        converter.add_conversion(|typ| {
            if integer_width(typ).is_some() {
                Ok(Some(IntegerType::shared(32)))
            } else {
                Ok(None)
            }
        });
        converter.add_conversion(|typ| match integer_width(typ) {
            Some(64) => Err(anyhow::anyhow!("no 64-bit support")),
            _ => Ok(None),
        });
        converter
    }

    #[test]
    fn later_conversions_take_precedence() {
        let converter = converter();
        let converted = converter.convert_type(&IntegerType::shared(8)).unwrap();
        assert_eq!(converted.unwrap().rd().to_string(), "i32");
        assert!(converter.convert_type(&IntegerType::shared(64)).is_err());
        assert!(converter
            .convert_type(&FloatType::shared(32))
            .unwrap()
            .is_none());
    }

    #[test]
    fn signature_fails_as_a_whole() {
        let converter = converter();
        let inputs = Types::from_vec(vec![IntegerType::shared(1), FloatType::shared(32)]);
        let results = Types::from_vec(vec![IntegerType::shared(1)]);
        assert!(converter
            .convert_signature(&inputs, &results)
            .unwrap()
            .is_none());

        let inputs = Types::from_vec(vec![IntegerType::shared(1), IntegerType::shared(16)]);
        let conversion = converter
            .convert_signature(&inputs, &results)
            .unwrap()
            .unwrap();
        assert_eq!(
            conversion.input_mapping(1),
            Some(InputMapping {
                input_no: 1,
                size: 1
            })
        );
        assert_eq!(conversion.converted_inputs().to_string(), "i32, i32");
        assert_eq!(conversion.result_types().to_string(), "i32");
    }

    #[test]
    fn appended_inputs_are_named_after_position() {
        let argument = BlockArgument::new("%a", IntegerType::shared(1));
        let argument = Shared::new(RwLock::new(Value::BlockArgument(argument)));
        let arguments = Values::from_vec(vec![argument]);
        let mut conversion = SignatureConversion::new(1);
        conversion.add_inputs(0, vec![IntegerType::shared(32)]);
        conversion.append_input(FloatType::shared(32));
        apply_signature_conversion(&arguments, None, &conversion).unwrap();
        assert_eq!(arguments.types().to_string(), "i32, f32");
        assert_eq!(arguments.get(1).unwrap().rd().name(), "%arg1");
    }
}
