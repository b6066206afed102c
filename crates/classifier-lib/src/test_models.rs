//! In-memory ONNX graphs for tests
//!
//! `argmax_classifier` takes the encoded `f32[1, 5]` row and emits the
//! column index of its largest value as the label (`i64[1]`) plus a softmax
//! over the row as probabilities (`f32[1, 5]`).

use tract_onnx::pb::{
    attribute_proto::AttributeType, tensor_proto::DataType, tensor_shape_proto, type_proto,
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto,
    StringStringEntryProto, TensorShapeProto, TypeProto, ValueInfoProto,
};

fn tensor_value(name: &str, elem_type: DataType, dims: &[i64]) -> ValueInfoProto {
    let dim = dims
        .iter()
        .map(|&d| tensor_shape_proto::Dimension {
            value: Some(tensor_shape_proto::dimension::Value::DimValue(d)),
            ..Default::default()
        })
        .collect();

    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: elem_type as i32,
                shape: Some(TensorShapeProto { dim }),
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn int_attr(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Int as i32,
        i: value,
        ..Default::default()
    }
}

pub(crate) fn node(op_type: &str, domain: &str, inputs: &[&str], outputs: &[&str]) -> NodeProto {
    NodeProto {
        op_type: op_type.to_string(),
        domain: domain.to_string(),
        input: inputs.iter().map(|s| s.to_string()).collect(),
        output: outputs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// ArgMax + Softmax classifier over the five encoded features
pub(crate) fn argmax_classifier(classes: Option<&str>) -> ModelProto {
    let mut argmax = node("ArgMax", "", &["features"], &["label"]);
    argmax.attribute = vec![int_attr("axis", 1), int_attr("keepdims", 0)];

    let mut softmax = node("Softmax", "", &["features"], &["probabilities"]);
    softmax.attribute = vec![int_attr("axis", 1)];

    let graph = GraphProto {
        name: "drug_pipeline".to_string(),
        node: vec![argmax, softmax],
        input: vec![tensor_value("features", DataType::Float, &[1, 5])],
        output: vec![
            tensor_value("label", DataType::Int64, &[1]),
            tensor_value("probabilities", DataType::Float, &[1, 5]),
        ],
        ..Default::default()
    };

    let metadata_props = classes
        .map(|c| {
            vec![StringStringEntryProto {
                key: "classes".to_string(),
                value: c.to_string(),
            }]
        })
        .unwrap_or_default();

    ModelProto {
        ir_version: 8,
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: 13,
        }],
        model_version: 1,
        graph: Some(graph),
        metadata_props,
        ..Default::default()
    }
}
