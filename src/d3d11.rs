//! D3D11 Backend
//!
//! Direct3D 11 device with a DXGI swap chain on a host window. The frame
//! texture is a dynamic BGRA texture refreshed with `Map(WRITE_DISCARD)`;
//! the quad is drawn with runtime-compiled shaders.

use std::mem::size_of;

use tracing::{debug, info, warn};
use windows::core::{s, Interface, PCSTR};
use windows::Win32::Foundation::{BOOL, HMODULE, HWND};
use windows::Win32::Graphics::Direct3D::Fxc::{D3DCompile, D3DCOMPILE_OPTIMIZATION_LEVEL3};
use windows::Win32::Graphics::Direct3D::{
    ID3DBlob, D3D_DRIVER_TYPE_UNKNOWN, D3D_FEATURE_LEVEL_10_0, D3D_FEATURE_LEVEL_11_0,
    D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP,
};
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::config::{BufferingMode, FilterMode, PresentParams};
use crate::device::{
    AdapterInfo, Device, DeviceFactory, DisplayMode, DrawPass, Extent, Frame, Quad, Vertex,
};
use crate::error::DeviceError;

const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_B8G8R8A8_UNORM;

const QUAD_HLSL: &str = r#"
struct VsOut {
    float4 pos : SV_Position;
    float2 uv : TEXCOORD0;
};

VsOut vs_main(float2 pos : POSITION, float2 uv : TEXCOORD0) {
    VsOut o;
    o.pos = float4(pos, 0.0, 1.0);
    o.uv = uv;
    return o;
}

Texture2D frame_tex : register(t0);
SamplerState frame_sampler : register(s0);

float4 ps_main(VsOut i) : SV_Target {
    return float4(frame_tex.Sample(frame_sampler, i.uv).rgb, 1.0);
}
"#;

fn driver_error(context: &str, err: windows::core::Error) -> DeviceError {
    let code = err.code();
    if code == DXGI_ERROR_DEVICE_REMOVED || code == DXGI_ERROR_DEVICE_RESET {
        DeviceError::Lost
    } else {
        DeviceError::Driver(format!("{}: {}", context, err))
    }
}

fn created<T>(value: Option<T>, what: &str) -> Result<T, DeviceError> {
    value.ok_or_else(|| DeviceError::Driver(format!("{} returned no object", what)))
}

/// Creates D3D11 devices presenting into one host window
pub struct D3D11Factory {
    hwnd: HWND,
    factory: IDXGIFactory1,
}

impl D3D11Factory {
    /// Resolve DXGI for presenting into `hwnd`.
    pub fn new(hwnd: HWND) -> Result<Self, DeviceError> {
        // SAFETY: CreateDXGIFactory1 has no preconditions.
        let factory = unsafe { CreateDXGIFactory1::<IDXGIFactory1>() }
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;
        Ok(Self { hwnd, factory })
    }

    fn adapter(&self, index: u32) -> Result<IDXGIAdapter1, DeviceError> {
        // SAFETY: the factory is valid; out-of-range indices return an error.
        unsafe { self.factory.EnumAdapters1(index) }.map_err(|_| DeviceError::InvalidAdapter {
            index,
            count: self.adapters().len(),
        })
    }
}

fn display_modes(adapter: &IDXGIAdapter1) -> Vec<DisplayMode> {
    // SAFETY: GetDisplayModeList is called once for the count, then with a
    // buffer of exactly that many entries.
    unsafe {
        let Ok(output) = adapter.EnumOutputs(0) else {
            return Vec::new();
        };
        let mut count = 0u32;
        if output
            .GetDisplayModeList(BACK_BUFFER_FORMAT, 0, &mut count, None)
            .is_err()
        {
            return Vec::new();
        }
        let mut descs = vec![DXGI_MODE_DESC::default(); count as usize];
        if output
            .GetDisplayModeList(BACK_BUFFER_FORMAT, 0, &mut count, Some(descs.as_mut_ptr()))
            .is_err()
        {
            return Vec::new();
        }
        descs.truncate(count as usize);

        let mut modes: Vec<DisplayMode> = descs
            .iter()
            .map(|d| DisplayMode {
                width: d.Width,
                height: d.Height,
                rate_dhz: if d.RefreshRate.Denominator == 0 {
                    0
                } else {
                    ((u64::from(d.RefreshRate.Numerator) * 10
                        + u64::from(d.RefreshRate.Denominator) / 2)
                        / u64::from(d.RefreshRate.Denominator)) as u32
                },
            })
            .collect();
        modes.dedup();
        modes
    }
}

impl DeviceFactory for D3D11Factory {
    type Device = D3D11Device;

    fn adapters(&self) -> Vec<AdapterInfo> {
        let mut adapters = Vec::new();
        let mut index = 0;
        // SAFETY: enumeration stops at the first index DXGI rejects.
        while let Ok(adapter) = unsafe { self.factory.EnumAdapters1(index) } {
            let name = unsafe { adapter.GetDesc1() }
                .map(|desc| {
                    String::from_utf16_lossy(&desc.Description)
                        .trim_end_matches('\0')
                        .to_string()
                })
                .unwrap_or_default();
            adapters.push(AdapterInfo {
                index,
                name,
                modes: display_modes(&adapter),
            });
            index += 1;
        }
        adapters
    }

    fn create_device(
        &mut self,
        adapter: u32,
        params: &PresentParams,
    ) -> Result<D3D11Device, DeviceError> {
        let dxgi_adapter: IDXGIAdapter = self
            .adapter(adapter)?
            .cast()
            .map_err(|e| driver_error("IDXGIAdapter cast", e))?;

        let mut device = None;
        let mut context = None;
        // SAFETY: out pointers are valid for the duration of the call.
        unsafe {
            D3D11CreateDevice(
                &dxgi_adapter,
                D3D_DRIVER_TYPE_UNKNOWN,
                HMODULE::default(),
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                Some(&[D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_10_0]),
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
        }
        .map_err(|e| DeviceError::Unavailable(format!("D3D11CreateDevice: {}", e)))?;
        let device = created(device, "D3D11CreateDevice")?;
        let context = created(context, "D3D11CreateDevice")?;

        let swap_chain = self.create_swap_chain(&device, params)?;
        let pipeline = Pipeline::new(&device)?;

        let mut d3d = D3D11Device {
            rtv: None,
            swap_chain,
            pipeline,
            context,
            device,
            extent: params.extent,
            buffering: params.buffering,
            exclusive: false,
        };

        if params.exclusive {
            d3d.enter_exclusive(params)?;
        }
        d3d.create_rtv()?;

        info!(
            "D3D11 device created: {} {:?} {}",
            params.extent,
            params.buffering,
            if params.exclusive { "exclusive" } else { "windowed" }
        );
        Ok(d3d)
    }
}

impl D3D11Factory {
    fn create_swap_chain(
        &self,
        device: &ID3D11Device,
        params: &PresentParams,
    ) -> Result<IDXGISwapChain, DeviceError> {
        let swap_effect = match params.buffering {
            BufferingMode::Single => DXGI_SWAP_EFFECT_SEQUENTIAL,
            BufferingMode::DoubleFlip | BufferingMode::TripleBuffer => {
                DXGI_SWAP_EFFECT_FLIP_DISCARD
            }
            BufferingMode::BlitCopy => DXGI_SWAP_EFFECT_DISCARD,
        };

        let desc = DXGI_SWAP_CHAIN_DESC {
            BufferDesc: DXGI_MODE_DESC {
                Width: params.extent.width,
                Height: params.extent.height,
                RefreshRate: DXGI_RATIONAL {
                    Numerator: params.rate_dhz,
                    Denominator: if params.rate_dhz == 0 { 0 } else { 10 },
                },
                Format: BACK_BUFFER_FORMAT,
                ..Default::default()
            },
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: params.buffering.buffer_count(),
            OutputWindow: self.hwnd,
            Windowed: BOOL::from(true),
            SwapEffect: swap_effect,
            Flags: DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH.0 as u32,
        };

        let mut swap_chain = None;
        // SAFETY: desc is fully initialized and the window outlives the factory.
        unsafe { self.factory.CreateSwapChain(device, &desc, &mut swap_chain) }
            .ok()
            .map_err(|e| driver_error("CreateSwapChain", e))?;
        created(swap_chain, "CreateSwapChain")
    }
}

/// Shaders, layout and samplers for the quad
struct Pipeline {
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    point_sampler: ID3D11SamplerState,
    linear_sampler: ID3D11SamplerState,
}

fn compile(entry: PCSTR, target: PCSTR) -> Result<ID3DBlob, DeviceError> {
    let mut blob = None;
    let mut errors: Option<ID3DBlob> = None;
    // SAFETY: the source slice and entry/target strings outlive the call.
    let result = unsafe {
        D3DCompile(
            QUAD_HLSL.as_ptr() as *const _,
            QUAD_HLSL.len(),
            PCSTR::null(),
            None,
            None,
            entry,
            target,
            D3DCOMPILE_OPTIMIZATION_LEVEL3,
            0,
            &mut blob,
            Some(&mut errors),
        )
    };
    if let Err(err) = result {
        let message = errors
            .map(|b| String::from_utf8_lossy(blob_bytes(&b)).to_string())
            .unwrap_or_else(|| err.to_string());
        return Err(DeviceError::Driver(format!(
            "shader compilation failed: {}",
            message.trim_end_matches('\0')
        )));
    }
    created(blob, "D3DCompile")
}

fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    // SAFETY: the blob owns GetBufferSize() bytes at GetBufferPointer().
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}

fn sampler(device: &ID3D11Device, filter: D3D11_FILTER) -> Result<ID3D11SamplerState, DeviceError> {
    let desc = D3D11_SAMPLER_DESC {
        Filter: filter,
        AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
        AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
        AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
        MipLODBias: 0.0,
        MaxAnisotropy: 1,
        ComparisonFunc: D3D11_COMPARISON_NEVER,
        BorderColor: [0.0; 4],
        MinLOD: 0.0,
        MaxLOD: D3D11_FLOAT32_MAX,
    };
    let mut state = None;
    // SAFETY: desc is fully initialized.
    unsafe { device.CreateSamplerState(&desc, Some(&mut state)) }
        .map_err(|e| driver_error("CreateSamplerState", e))?;
    created(state, "CreateSamplerState")
}

impl Pipeline {
    fn new(device: &ID3D11Device) -> Result<Self, DeviceError> {
        let vs_blob = compile(s!("vs_main"), s!("vs_4_0"))?;
        let ps_blob = compile(s!("ps_main"), s!("ps_4_0"))?;
        let vs_bytes = blob_bytes(&vs_blob);

        let elements = [
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("POSITION"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("TEXCOORD"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: D3D11_APPEND_ALIGNED_ELEMENT,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];

        let mut vertex_shader = None;
        let mut pixel_shader = None;
        let mut input_layout = None;
        // SAFETY: bytecode slices come from successful compilations.
        unsafe {
            device
                .CreateVertexShader(vs_bytes, None, Some(&mut vertex_shader))
                .map_err(|e| driver_error("CreateVertexShader", e))?;
            device
                .CreatePixelShader(blob_bytes(&ps_blob), None, Some(&mut pixel_shader))
                .map_err(|e| driver_error("CreatePixelShader", e))?;
            device
                .CreateInputLayout(&elements, vs_bytes, Some(&mut input_layout))
                .map_err(|e| driver_error("CreateInputLayout", e))?;
        }

        Ok(Self {
            vertex_shader: created(vertex_shader, "CreateVertexShader")?,
            pixel_shader: created(pixel_shader, "CreatePixelShader")?,
            input_layout: created(input_layout, "CreateInputLayout")?,
            point_sampler: sampler(device, D3D11_FILTER_MIN_MAG_MIP_POINT)?,
            linear_sampler: sampler(device, D3D11_FILTER_MIN_MAG_MIP_LINEAR)?,
        })
    }
}

/// Dynamic BGRA frame texture and its shader view
pub struct D3D11Texture {
    srv: ID3D11ShaderResourceView,
    texture: ID3D11Texture2D,
}

/// Dynamic vertex buffer holding the quad
pub struct D3D11VertexBuffer {
    buffer: ID3D11Buffer,
}

/// Live D3D11 session.
///
/// Fields drop top to bottom: render target view, swap chain, pipeline,
/// context, device.
pub struct D3D11Device {
    rtv: Option<ID3D11RenderTargetView>,
    swap_chain: IDXGISwapChain,
    pipeline: Pipeline,
    context: ID3D11DeviceContext,
    device: ID3D11Device,
    extent: Extent,
    buffering: BufferingMode,
    exclusive: bool,
}

impl D3D11Device {
    fn enter_exclusive(&mut self, params: &PresentParams) -> Result<(), DeviceError> {
        let mode = DXGI_MODE_DESC {
            Width: params.extent.width,
            Height: params.extent.height,
            RefreshRate: DXGI_RATIONAL {
                Numerator: params.rate_dhz,
                Denominator: if params.rate_dhz == 0 { 0 } else { 10 },
            },
            Format: BACK_BUFFER_FORMAT,
            ..Default::default()
        };
        // SAFETY: the swap chain is live and no views of its buffers exist.
        unsafe {
            self.swap_chain
                .ResizeTarget(&mode)
                .map_err(|_| DeviceError::Unsupported(params.extent))?;
            self.swap_chain
                .SetFullscreenState(BOOL::from(true), None)
                .map_err(|_| DeviceError::Unsupported(params.extent))?;
        }
        self.exclusive = true;
        self.resize_swap_chain(params.extent)
    }

    fn resize_swap_chain(&mut self, extent: Extent) -> Result<(), DeviceError> {
        self.rtv = None;
        // SAFETY: all references to the back buffers were released above.
        unsafe {
            self.context.ClearState();
            self.swap_chain.ResizeBuffers(
                self.buffering.buffer_count(),
                extent.width,
                extent.height,
                BACK_BUFFER_FORMAT,
                DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH,
            )
        }
        .map_err(|e| match driver_error("ResizeBuffers", e) {
            DeviceError::Lost => DeviceError::Lost,
            _ => DeviceError::Unsupported(extent),
        })?;
        self.extent = extent;
        Ok(())
    }

    fn create_rtv(&mut self) -> Result<(), DeviceError> {
        // SAFETY: buffer 0 always exists on a live swap chain.
        let back_buffer: ID3D11Texture2D = unsafe { self.swap_chain.GetBuffer(0) }
            .map_err(|e| driver_error("GetBuffer", e))?;
        let mut rtv = None;
        unsafe {
            self.device
                .CreateRenderTargetView(&back_buffer, None, Some(&mut rtv))
        }
        .map_err(|e| driver_error("CreateRenderTargetView", e))?;
        self.rtv = Some(created(rtv, "CreateRenderTargetView")?);
        Ok(())
    }

    fn write_mapped(
        &self,
        resource: &ID3D11Resource,
        write: impl FnOnce(*mut u8, usize),
    ) -> Result<(), DeviceError> {
        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        // SAFETY: the resource is dynamic with CPU write access; the mapping
        // is released before returning.
        unsafe {
            self.context
                .Map(resource, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))
                .map_err(|e| driver_error("Map", e))?;
            write(mapped.pData as *mut u8, mapped.RowPitch as usize);
            self.context.Unmap(resource, 0);
        }
        Ok(())
    }
}

impl Drop for D3D11Device {
    fn drop(&mut self) {
        if self.exclusive {
            // Swap chains must leave fullscreen before release
            // SAFETY: the swap chain is still live.
            if let Err(err) = unsafe { self.swap_chain.SetFullscreenState(BOOL::from(false), None) } {
                warn!("Leaving exclusive mode failed: {}", err);
            }
        }
        // SAFETY: the context is live; unbinding lets resources release.
        unsafe { self.context.ClearState() };
        debug!("D3D11 device released");
    }
}

impl Device for D3D11Device {
    type Texture = D3D11Texture;
    type VertexBuffer = D3D11VertexBuffer;

    fn max_texture_size(&self) -> u32 {
        D3D11_REQ_TEXTURE2D_U_OR_V_DIMENSION
    }

    fn back_buffer_extent(&self) -> Extent {
        self.extent
    }

    fn resize_buffers(&mut self, extent: Extent) -> Result<(), DeviceError> {
        if extent.is_empty() {
            return Err(DeviceError::Unsupported(extent));
        }
        self.resize_swap_chain(extent)?;
        self.create_rtv()
    }

    fn create_texture(&mut self, extent: Extent) -> Result<D3D11Texture, DeviceError> {
        let desc = D3D11_TEXTURE2D_DESC {
            Width: extent.width,
            Height: extent.height,
            MipLevels: 1,
            ArraySize: 1,
            Format: BACK_BUFFER_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            MiscFlags: 0,
        };
        let mut texture = None;
        let mut srv = None;
        // SAFETY: desc is fully initialized.
        unsafe {
            self.device
                .CreateTexture2D(&desc, None, Some(&mut texture))
                .map_err(|e| driver_error("CreateTexture2D", e))?;
            let texture = created(texture.as_ref(), "CreateTexture2D")?;
            self.device
                .CreateShaderResourceView(texture, None, Some(&mut srv))
                .map_err(|e| driver_error("CreateShaderResourceView", e))?;
        }
        Ok(D3D11Texture {
            srv: created(srv, "CreateShaderResourceView")?,
            texture: created(texture, "CreateTexture2D")?,
        })
    }

    fn upload(&mut self, texture: &mut D3D11Texture, frame: &Frame<'_>) -> Result<(), DeviceError> {
        let resource: ID3D11Resource = texture
            .texture
            .cast()
            .map_err(|e| driver_error("ID3D11Resource cast", e))?;
        self.write_mapped(&resource, |dst, pitch| {
            for (y, row) in frame.rows().enumerate() {
                // SAFETY: the mapped texture is at least as large as the frame
                // and each row holds `pitch` bytes.
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        row.as_ptr() as *const u8,
                        dst.add(y * pitch),
                        row.len() * size_of::<u32>(),
                    );
                }
            }
        })
    }

    fn create_vertex_buffer(&mut self) -> Result<D3D11VertexBuffer, DeviceError> {
        let desc = D3D11_BUFFER_DESC {
            ByteWidth: (size_of::<Vertex>() * 4) as u32,
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_VERTEX_BUFFER.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            MiscFlags: 0,
            StructureByteStride: 0,
        };
        let mut buffer = None;
        // SAFETY: desc is fully initialized.
        unsafe { self.device.CreateBuffer(&desc, None, Some(&mut buffer)) }
            .map_err(|e| driver_error("CreateBuffer", e))?;
        Ok(D3D11VertexBuffer {
            buffer: created(buffer, "CreateBuffer")?,
        })
    }

    fn write_quad(&mut self, buffer: &mut D3D11VertexBuffer, quad: &Quad) -> Result<(), DeviceError> {
        let vertices = quad.vertices();
        let resource: ID3D11Resource = buffer
            .buffer
            .cast()
            .map_err(|e| driver_error("ID3D11Resource cast", e))?;
        self.write_mapped(&resource, |dst, _| {
            // SAFETY: the buffer was created to hold exactly four vertices.
            unsafe {
                std::ptr::copy_nonoverlapping(vertices.as_ptr(), dst as *mut Vertex, vertices.len());
            }
        })
    }

    fn draw(
        &mut self,
        texture: Option<&D3D11Texture>,
        buffer: &D3D11VertexBuffer,
        pass: DrawPass,
    ) -> Result<(), DeviceError> {
        let rtv = self
            .rtv
            .clone()
            .ok_or_else(|| DeviceError::Driver("no render target".to_string()))?;
        let sampler = match pass.filter {
            FilterMode::Nearest => &self.pipeline.point_sampler,
            FilterMode::Linear => &self.pipeline.linear_sampler,
        };
        let viewport = D3D11_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: self.extent.width as f32,
            Height: self.extent.height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        let stride = size_of::<Vertex>() as u32;
        let offset = 0u32;

        // SAFETY: every bound object is owned by this device session.
        unsafe {
            let ctx = &self.context;
            ctx.OMSetRenderTargets(Some(&[Some(rtv.clone())]), None);
            if pass.clear {
                ctx.ClearRenderTargetView(&rtv, &[0.0, 0.0, 0.0, 1.0]);
            }
            let Some(texture) = texture else {
                return Ok(());
            };
            ctx.RSSetViewports(Some(&[viewport]));
            ctx.IASetInputLayout(&self.pipeline.input_layout);
            ctx.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP);
            ctx.IASetVertexBuffers(
                0,
                1,
                Some(&Some(buffer.buffer.clone())),
                Some(&stride),
                Some(&offset),
            );
            ctx.VSSetShader(&self.pipeline.vertex_shader, None);
            ctx.PSSetShader(&self.pipeline.pixel_shader, None);
            ctx.PSSetShaderResources(0, Some(&[Some(texture.srv.clone())]));
            ctx.PSSetSamplers(0, Some(&[Some(sampler.clone())]));
            ctx.Draw(4, 0);
        }
        Ok(())
    }

    fn present(&mut self, interval: u32) -> Result<(), DeviceError> {
        // SAFETY: the swap chain is live.
        let hr = unsafe { self.swap_chain.Present(interval, DXGI_PRESENT(0)) };
        if hr == DXGI_ERROR_DEVICE_REMOVED || hr == DXGI_ERROR_DEVICE_RESET {
            // SAFETY: querying the removal reason has no preconditions.
            let reason = unsafe { self.device.GetDeviceRemovedReason() };
            warn!("Present reported device removal: {:?}", reason);
            return Err(DeviceError::Lost);
        }
        hr.ok().map_err(|e| driver_error("Present", e))?;
        if self.buffering.is_flip_model() {
            // Flip chains unbind the back buffer on present
            // SAFETY: the render target view is owned by this session.
            unsafe {
                self.context
                    .OMSetRenderTargets(Some(&[self.rtv.clone()]), None);
            }
        }
        Ok(())
    }
}
